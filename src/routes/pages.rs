use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::{format_db_time, Post, Role};
use crate::db::{posts, suggestions};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::flash::{redirect_with, Flash, IncomingFlash, Level};
use crate::routes::{Page, PageContext};
use crate::state::AppState;

/// Number of posts featured on the landing page.
const HOME_POST_COUNT: i64 = 3;

// --- View structs ---

pub struct PostCard {
    pub title: String,
    pub description: String,
    pub location: String,
    pub budget: i64,
    pub on_ground_members: String,
    pub author: String,
    pub timestamp: String,
    /// Empty when the post has no media.
    pub cover: String,
    pub media: Vec<String>,
}

impl From<Post> for PostCard {
    fn from(post: Post) -> Self {
        Self {
            cover: post.media.first().cloned().unwrap_or_default(),
            title: post.title,
            description: post.description,
            location: post.location,
            budget: post.budget,
            on_ground_members: post.on_ground_members.unwrap_or_default(),
            author: post.author,
            timestamp: format_db_time(&post.created_at, "%B %d, %Y"),
            media: post.media,
        }
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "pages/activities.html")]
pub struct ActivitiesTemplate {
    pub ctx: PageContext,
    pub posts: Vec<PostCard>,
    pub total_budget: i64,
}

#[derive(Template)]
#[template(path = "pages/donate.html")]
pub struct DonateTemplate {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "pages/suggest.html")]
pub struct SuggestTemplate {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "pages/leader_dashboard.html")]
pub struct LeaderDashboardTemplate {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "pages/coleader_dashboard.html")]
pub struct CoLeaderDashboardTemplate {
    pub ctx: PageContext,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct SuggestionForm {
    pub suggestion_text: Option<String>,
    pub name: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/activities", get(activities))
        .route("/donate", get(donate))
        .route("/suggest", get(suggest_page).post(suggest_submit))
        .route("/dashboard", get(dashboard))
}

// --- Handlers ---

async fn home(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> AppResult<Page<HomeTemplate>> {
    let posts = {
        let conn = state.db.get()?;
        posts::list(&conn, Some(HOME_POST_COUNT))?
    };

    Ok(Page(HomeTemplate {
        ctx: PageContext::new(user.as_ref(), flash),
        posts: posts.into_iter().map(PostCard::from).collect(),
    }))
}

async fn about(MaybeUser(user): MaybeUser, IncomingFlash(flash): IncomingFlash) -> Page<AboutTemplate> {
    Page(AboutTemplate {
        ctx: PageContext::new(user.as_ref(), flash),
    })
}

async fn activities(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> AppResult<Page<ActivitiesTemplate>> {
    let (posts, total_budget) = {
        let conn = state.db.get()?;
        (posts::list(&conn, None)?, posts::total_budget(&conn)?)
    };

    Ok(Page(ActivitiesTemplate {
        ctx: PageContext::new(user.as_ref(), flash),
        posts: posts.into_iter().map(PostCard::from).collect(),
        total_budget,
    }))
}

async fn donate(MaybeUser(user): MaybeUser, IncomingFlash(flash): IncomingFlash) -> Page<DonateTemplate> {
    Page(DonateTemplate {
        ctx: PageContext::new(user.as_ref(), flash),
    })
}

async fn suggest_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> Page<SuggestTemplate> {
    Page(SuggestTemplate {
        ctx: PageContext::new(user.as_ref(), flash),
    })
}

/// Signed-in users are recorded under their username; anyone else under
/// the name they typed, or "Anonymous".
async fn suggest_submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<SuggestionForm>,
) -> AppResult<Response> {
    let text = form.suggestion_text.as_deref().map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Ok(redirect_with(
            "/suggest",
            Flash::new(Level::Danger, "Suggestion cannot be empty."),
        ));
    }

    let (suggester_name, user_id) = match &user {
        Some(u) => (u.username.clone(), Some(u.id)),
        None => (
            form.name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or("Anonymous")
                .to_string(),
            None,
        ),
    };

    {
        let conn = state.db.get()?;
        suggestions::insert(&conn, text, &suggester_name, user_id)?;
    }

    Ok(redirect_with(
        "/",
        Flash::new(Level::Success, "Thank you for your suggestion!"),
    ))
}

async fn dashboard(MaybeUser(user): MaybeUser, IncomingFlash(flash): IncomingFlash) -> Response {
    let Some(user) = user else {
        return redirect_with(
            "/login",
            Flash::new(Level::Info, "Please log in to access this page."),
        );
    };

    let ctx = PageContext::new(Some(&user), flash);
    match user.role {
        Role::Leader => Page(LeaderDashboardTemplate { ctx }).into_response(),
        Role::CoLeader => Page(CoLeaderDashboardTemplate { ctx }).into_response(),
        Role::Member => Redirect::to("/activities").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_card_uses_first_media_as_cover() {
        let card = PostCard::from(Post {
            id: 1,
            title: "Cleanup".into(),
            description: "River".into(),
            budget: 10,
            location: "Riverside".into(),
            on_ground_members: None,
            created_by: 1,
            author: "lead".into(),
            created_at: "2025-05-01 10:00:00.000".into(),
            media: vec!["posts/1_a.jpg".into(), "posts/1_b.jpg".into()],
        });
        assert_eq!(card.cover, "posts/1_a.jpg");
        assert_eq!(card.on_ground_members, "");
        assert_eq!(card.timestamp, "May 01, 2025");
    }

    #[test]
    fn home_template_renders_cover_image() {
        let html = HomeTemplate {
            ctx: PageContext::default(),
            posts: vec![PostCard {
                title: "Cleanup <day>".into(),
                description: "d".into(),
                location: "l".into(),
                budget: 0,
                on_ground_members: String::new(),
                author: "lead".into(),
                timestamp: "May 01, 2025".into(),
                cover: "posts/1_a.jpg".into(),
                media: vec!["posts/1_a.jpg".into()],
            }],
        }
        .render()
        .unwrap();
        assert!(html.contains("src=\"/uploads/"));
        assert!(html.contains("1_a.jpg"));
        assert!(html.contains("&lt;day&gt;"));
        assert!(!html.contains("<day>"));
    }
}

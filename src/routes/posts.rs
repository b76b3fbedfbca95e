use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{require_role, LEADERS, POST_MANAGERS};
use crate::db::models::{format_db_time, Comment, Post};
use crate::db::posts::NewPost;
use crate::db::{comments, posts};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forms::{parse_budget, MultipartForm};
use crate::routes::upload_url;
use crate::state::AppState;
use crate::uploads::POSTS_DIR;

// --- Views ---

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub budget: i64,
    pub location: String,
    pub media: Vec<String>,
    pub on_ground_members: Option<String>,
    pub author: String,
    pub timestamp: String,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            description: post.description,
            budget: post.budget,
            location: post.location,
            media: post.media,
            on_ground_members: post.on_ground_members,
            author: post.author,
            timestamp: format_db_time(&post.created_at, "%B %d, %Y"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostListing {
    pub posts: Vec<PostView>,
    pub total_budget: i64,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub comment_text: String,
    pub author: String,
    pub profile_pic: String,
    pub timestamp: String,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            comment_text: comment.comment_text,
            author: comment.author,
            profile_pic: upload_url(&comment.author_profile_pic),
            timestamp: format_db_time(&comment.created_at, "%b %d, %H:%M"),
        }
    }
}

// --- Requests ---

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub comment_text: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/create_post", post(create_post))
        .route("/api/delete_post/{id}", delete(delete_post))
        .route(
            "/api/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
}

// --- Handlers ---

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<PostListing>> {
    let conn = state.db.get()?;
    let posts = posts::list(&conn, None)?;
    let total_budget = posts::total_budget(&conn)?;

    Ok(Json(PostListing {
        posts: posts.into_iter().map(PostView::from).collect(),
        total_budget,
    }))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    require_role(&user, POST_MANAGERS)?;

    let form = MultipartForm::read(multipart?).await?;
    let new_post = NewPost {
        title: form.required("title")?,
        description: form.required("description")?,
        budget: parse_budget(&form.required("budget")?)?,
        location: form.required("location")?,
        on_ground_members: form.optional("on_ground_members"),
    };

    // Post, media rows and files succeed or fail together.
    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;
    let post_id = posts::insert(&tx, &new_post, user.id)?;

    let paths = state
        .uploads
        .save_all(POSTS_DIR, &post_id.to_string(), form.files("media"))?;
    let recorded = paths
        .iter()
        .try_for_each(|path| posts::add_media(&tx, post_id, path).map(|_| ()))
        .and_then(|()| tx.commit().map_err(AppError::from));
    if let Err(e) = recorded {
        state.uploads.remove_all(&paths);
        return Err(e);
    }

    tracing::info!(
        "{} created post {} with {} media file(s)",
        user.username,
        post_id,
        paths.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Post created successfully",
            "id": post_id,
        })),
    )
        .into_response())
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Response> {
    require_role(&user, LEADERS)?;
    let Path(id) = path?;

    let paths = {
        let mut conn = state.db.get()?;
        posts::delete_cascade(&mut conn, id)?
    };
    let warnings = state.uploads.remove_all(&paths);

    tracing::info!(
        "{} deleted post {} ({} file(s), {} not removed)",
        user.username,
        id,
        paths.len(),
        warnings.len()
    );

    Ok(Json(serde_json::json!({ "message": "Post deleted successfully" })).into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Vec<CommentView>>> {
    let Path(post_id) = path?;
    let conn = state.db.get()?;
    if !posts::exists(&conn, post_id)? {
        return Err(AppError::NotFound);
    }
    let comments = comments::list_for_post(&conn, post_id)?;
    Ok(Json(comments.into_iter().map(CommentView::from).collect()))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Path(post_id) = path?;
    let Json(req) = body?;
    let text = req.comment_text.as_deref().map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment text cannot be empty".into()));
    }

    let comment = {
        let conn = state.db.get()?;
        if !posts::exists(&conn, post_id)? {
            return Err(AppError::NotFound);
        }
        comments::insert(&conn, post_id, user.id, text)?
    };

    Ok((StatusCode::CREATED, Json(CommentView::from(comment))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_view_formats_timestamp() {
        let view = PostView::from(Post {
            id: 1,
            title: "Cleanup".into(),
            description: "River".into(),
            budget: 500,
            location: "Riverside".into(),
            on_ground_members: None,
            created_by: 1,
            author: "lead".into(),
            created_at: "2025-03-02 08:00:00.000".into(),
            media: vec!["posts/1_a.jpg".into()],
        });
        assert_eq!(view.timestamp, "March 02, 2025");
        assert_eq!(view.media, vec!["posts/1_a.jpg"]);
    }

    #[test]
    fn comment_view_links_profile_picture() {
        let view = CommentView::from(Comment {
            id: 3,
            post_id: 1,
            user_id: 2,
            comment_text: "Count me in".into(),
            author: "mem".into(),
            author_profile_pic: "profiles/default.png".into(),
            created_at: "2025-03-02 08:05:00.000".into(),
        });
        assert_eq!(view.profile_pic, "/uploads/profiles/default.png");
        assert_eq!(view.timestamp, "Mar 02, 08:05");
    }
}

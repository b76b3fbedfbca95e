use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::{require_role, POST_MANAGERS};
use crate::db::models::{format_db_time, Suggestion};
use crate::db::suggestions;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SuggestionView {
    pub id: i64,
    pub text: String,
    pub suggester_name: String,
    pub timestamp: String,
}

impl From<Suggestion> for SuggestionView {
    fn from(s: Suggestion) -> Self {
        Self {
            id: s.id,
            text: s.text,
            suggester_name: s.suggester_name,
            timestamp: format_db_time(&s.created_at, "%B %d, %Y %H:%M"),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/suggestions", get(list_suggestions))
}

async fn list_suggestions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<SuggestionView>>> {
    require_role(&user, POST_MANAGERS)?;

    let conn = state.db.get()?;
    let suggestions = suggestions::list(&conn)?;
    Ok(Json(
        suggestions.into_iter().map(SuggestionView::from).collect(),
    ))
}

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::{require_role, LEADERS};
use crate::db::models::{Role, User};
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::upload_url;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub profile_pic_path: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            profile_pic_path: upload_url(&user.profile_pic_path),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/promote_user/{id}", post(promote_user))
        .route("/api/demote_user/{id}", post(demote_user))
        .route("/api/delete_user/{id}", delete(delete_user))
}

fn message(text: String) -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "message": text }))).into_response()
}

async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<UserView>>> {
    require_role(&user, LEADERS)?;

    let conn = state.db.get()?;
    let users = users::list(&conn)?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

async fn promote_user(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Response> {
    require_role(&user, LEADERS)?;
    let Path(id) = path?;

    let conn = state.db.get()?;
    let promoted = users::promote(&conn, id)?;
    tracing::info!("{} promoted {} to {}", user.username, promoted.username, promoted.role);
    Ok(message(format!(
        "User {} promoted to {}",
        promoted.username, promoted.role
    )))
}

async fn demote_user(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Response> {
    require_role(&user, LEADERS)?;
    let Path(id) = path?;

    let conn = state.db.get()?;
    let demoted = users::demote(&conn, id)?;
    tracing::info!("{} demoted {} to {}", user.username, demoted.username, demoted.role);
    Ok(message(format!(
        "User {} demoted to {}",
        demoted.username, demoted.role
    )))
}

async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Response> {
    require_role(&user, LEADERS)?;
    let Path(id) = path?;

    let profile_pic = {
        let mut conn = state.db.get()?;
        let target = users::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
        if target.id == user.id {
            return Err(AppError::Forbidden("You cannot delete yourself.".into()));
        }
        if target.role == Role::Leader {
            return Err(AppError::Forbidden("Cannot delete a Leader account".into()));
        }
        users::delete_cascade(&mut conn, id)?
    };

    if let Some(path) = profile_pic {
        state.uploads.remove_all(&[path]);
    }

    tracing::info!("{} deleted user {}", user.username, id);
    Ok(message("User deleted successfully".to_string()))
}

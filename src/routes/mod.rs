pub mod auth;
pub mod pages;
pub mod posts;
pub mod suggestions;
pub mod users;

use askama::Template;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::extractors::CurrentUser;
use crate::flash::{self, Flash};
use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_mb * 1024 * 1024;

    Router::new()
        .merge(pages::router())
        .merge(auth::router())
        .merge(posts::router())
        .merge(suggestions::router())
        .merge(users::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Public URL of a stored upload.
pub fn upload_url(relative: &str) -> String {
    format!("/uploads/{relative}")
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// A rendered page. Consumes any pending flash message.
pub struct Page<T: Template>(pub T);

impl<T: Template> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        ([(header::SET_COOKIE, flash::clear_cookie())], Html(self.0)).into_response()
    }
}

/// Values every page layout shows: who is signed in and the flash banner.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub username: String,
    pub role: String,
    pub flash_level: &'static str,
    pub flash_message: String,
}

impl PageContext {
    pub fn new(user: Option<&CurrentUser>, flash: Option<Flash>) -> Self {
        let (flash_level, flash_message) = match flash {
            Some(f) => (f.level_class(), f.message),
            None => ("", String::new()),
        };
        Self {
            username: user.map(|u| u.username.clone()).unwrap_or_default(),
            role: user.map(|u| u.role.to_string()).unwrap_or_default(),
            flash_level,
            flash_message,
        }
    }

    pub fn signed_in(&self) -> bool {
        !self.username.is_empty()
    }
}

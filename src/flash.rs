//! One-shot messages carried across a redirect in a short-lived cookie.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;

use crate::extractors::get_cookie_value;

const FLASH_COOKIE: &str = "groundwork_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Danger,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Danger => "danger",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Level::Success),
            "info" => Some(Level::Info),
            "danger" => Some(Level::Danger),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Cookie values cannot hold arbitrary text, so the payload is hex.
    fn encode(&self) -> String {
        hex::encode(format!("{}:{}", self.level.as_str(), self.message))
    }

    fn decode(value: &str) -> Option<Self> {
        let raw = String::from_utf8(hex::decode(value).ok()?).ok()?;
        let (level, message) = raw.split_once(':')?;
        Some(Self::new(Level::parse(level)?, message))
    }

    pub fn level_class(&self) -> &'static str {
        self.level.as_str()
    }
}

/// Redirect to `location`, leaving a flash message for the next page.
pub fn redirect_with(location: &str, flash: Flash) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location.to_string()),
            (
                header::SET_COOKIE,
                format!(
                    "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=60",
                    FLASH_COOKIE,
                    flash.encode()
                ),
            ),
        ],
    )
        .into_response()
}

pub fn clear_cookie() -> String {
    format!("{FLASH_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// The pending flash message, if any. Pages that render it must also send
/// `clear_cookie()` so it shows only once.
pub struct IncomingFlash(pub Option<Flash>);

impl<S: Send + Sync> FromRequestParts<S> for IncomingFlash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(IncomingFlash(
            get_cookie_value(&parts.headers, FLASH_COOKIE).and_then(Flash::decode),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_flash_decodes_back() {
        let flash = Flash::new(Level::Danger, "Username or email already exists.");
        assert_eq!(Flash::decode(&flash.encode()), Some(flash));
    }

    #[test]
    fn tampered_flash_is_ignored() {
        assert_eq!(Flash::decode("zz"), None);
        assert_eq!(Flash::decode(&hex::encode("weird:hello")), None);
    }

    #[test]
    fn redirect_sets_location_and_cookie() {
        let response = redirect_with("/login", Flash::new(Level::Success, "Registered"));
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("groundwork_flash="));
    }
}

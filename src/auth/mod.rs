pub mod guard;
pub mod handlers;
pub mod password;
pub mod session;

pub use guard::{require_role, LEADERS, POST_MANAGERS};

use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;

/// May create posts and review suggestions.
pub const POST_MANAGERS: &[Role] = &[Role::Leader, Role::CoLeader];

/// May administer users and delete posts.
pub const LEADERS: &[Role] = &[Role::Leader];

/// Called at the top of a handler, after the `CurrentUser` extractor has
/// already rejected anonymous callers with 401.
pub fn require_role(user: &CurrentUser, allowed: &[Role]) -> AppResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::debug!(
            "Denied {} ({}); requires one of {:?}",
            user.username,
            user.role,
            allowed
        );
        Err(AppError::Forbidden("Forbidden: Insufficient permissions".into()))
    }
}

//! Maintenance commands run from the command line instead of the web server.

use std::io::{BufRead, Write};

use crate::db::{self, users};
use crate::state::DbPool;

/// Create the database file if needed and bring the schema up to date.
pub fn init_db(pool: &DbPool) -> anyhow::Result<()> {
    db::run_migrations(pool)?;
    tracing::info!("Database initialized");
    Ok(())
}

/// Prompt for a username on `input` and make that account a Leader.
/// Returns whether a user was promoted.
pub fn promote_leader<R: BufRead, W: Write>(
    pool: &DbPool,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<bool> {
    write!(output, "Username to promote to Leader: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let username = line.trim();

    let conn = pool.get()?;
    match users::make_leader(&conn, username)? {
        Some(user) => {
            writeln!(output, "User '{}' has been promoted to Leader.", user.username)?;
            tracing::info!("Promoted {} to Leader", user.username);
            Ok(true)
        }
        None => {
            writeln!(output, "User not found.")?;
            Ok(false)
        }
    }
}

use rusqlite::{params, Connection};

use crate::db::models::Suggestion;
use crate::error::AppResult;

pub fn insert(
    conn: &Connection,
    text: &str,
    suggester_name: &str,
    user_id: Option<i64>,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO suggestions (text, suggester_name, user_id) VALUES (?1, ?2, ?3)",
        params![text, suggester_name, user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Newest first.
pub fn list(conn: &Connection) -> AppResult<Vec<Suggestion>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, suggester_name, user_id, created_at
         FROM suggestions
         ORDER BY created_at DESC, id DESC",
    )?;
    let suggestions = stmt
        .query_map([], |row| {
            Ok(Suggestion {
                id: row.get(0)?,
                text: row.get(1)?,
                suggester_name: row.get(2)?,
                user_id: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(suggestions)
}

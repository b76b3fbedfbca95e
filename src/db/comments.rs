use rusqlite::{params, Connection, Row};

use crate::db::models::Comment;
use crate::error::AppResult;

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.user_id, c.comment_text,
        u.username, u.profile_pic_path, c.created_at
     FROM comments c
     JOIN users u ON u.id = c.user_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        comment_text: row.get(3)?,
        author: row.get(4)?,
        author_profile_pic: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn insert(conn: &Connection, post_id: i64, user_id: i64, text: &str) -> AppResult<Comment> {
    conn.execute(
        "INSERT INTO comments (post_id, user_id, comment_text) VALUES (?1, ?2, ?3)",
        params![post_id, user_id, text],
    )?;
    let id = conn.last_insert_rowid();
    Ok(conn.query_row(
        &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
        params![id],
        comment_from_row,
    )?)
}

/// Oldest first.
pub fn list_for_post(conn: &Connection, post_id: i64) -> AppResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC"
    ))?;
    let comments = stmt
        .query_map(params![post_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Role, User, DEFAULT_PROFILE_PIC};
use crate::error::{AppError, AppResult};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, profile_pic_path, created_at";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub profile_pic_path: &'a str,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        profile_pic_path: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn insert(conn: &Connection, user: &NewUser<'_>) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, profile_pic_path)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            user.username,
            user.email,
            user.password_hash,
            user.profile_pic_path
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest("Username or email already exists.".into())
        } else {
            AppError::Database(e)
        }
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn username_or_email_taken(conn: &Connection, username: &str, email: &str) -> AppResult<bool> {
    let taken = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1 OR email = ?2",
        params![username, email],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn list(conn: &Connection) -> AppResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn count(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

fn set_role(conn: &Connection, id: i64, role: Role) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET role = ?1 WHERE id = ?2",
        params![role, id],
    )?;
    Ok(())
}

/// Member -> Co-Leader. Any other current role is left untouched.
pub fn promote(conn: &Connection, id: i64) -> AppResult<User> {
    let mut user = find_by_id(conn, id)?.ok_or(AppError::NotFound)?;
    let next = user
        .role
        .promoted()
        .ok_or_else(|| AppError::InvalidState("User is not a Member".into()))?;
    set_role(conn, id, next)?;
    user.role = next;
    Ok(user)
}

/// Co-Leader -> Member. Any other current role is left untouched.
pub fn demote(conn: &Connection, id: i64) -> AppResult<User> {
    let mut user = find_by_id(conn, id)?.ok_or(AppError::NotFound)?;
    let next = user
        .role
        .demoted()
        .ok_or_else(|| AppError::InvalidState("User is not a Co-Leader".into()))?;
    set_role(conn, id, next)?;
    user.role = next;
    Ok(user)
}

/// Out-of-band Leader assignment used by the admin command.
pub fn make_leader(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    let Some(mut user) = find_by_username(conn, username)? else {
        return Ok(None);
    };
    set_role(conn, user.id, Role::Leader)?;
    user.role = Role::Leader;
    Ok(Some(user))
}

pub fn authored_post_count(conn: &Connection, id: i64) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE created_by = ?1",
        params![id],
        |row| row.get(0),
    )?)
}

/// Delete a user and everything that depends on them, atomically.
///
/// Comments and sessions go with the user. Suggestions stay, detached from
/// the account but keeping the name they were submitted under. Posts are
/// never cascaded: a user who still authors posts is refused.
///
/// Returns the profile picture path to remove from storage, if it is not
/// the shared default.
pub fn delete_cascade(conn: &mut Connection, id: i64) -> AppResult<Option<String>> {
    let tx = conn.transaction()?;

    let user = find_by_id(&tx, id)?.ok_or(AppError::NotFound)?;
    let posts = authored_post_count(&tx, id)?;
    if posts > 0 {
        return Err(AppError::InvalidState(format!(
            "User {} still authors {} post(s); delete them first",
            user.username, posts
        )));
    }

    tx.execute("DELETE FROM comments WHERE user_id = ?1", params![id])?;
    tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
    tx.execute(
        "UPDATE suggestions SET user_id = NULL WHERE user_id = ?1",
        params![id],
    )?;
    tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    tx.commit()?;

    Ok((user.profile_pic_path != DEFAULT_PROFILE_PIC).then_some(user.profile_pic_path))
}

#[cfg(test)]
pub(crate) fn insert_test_user(conn: &Connection, username: &str, role: Role) -> i64 {
    let email = format!("{username}@example.com");
    let id = insert(
        conn,
        &NewUser {
            username,
            email: &email,
            password_hash: "not-a-real-hash",
            profile_pic_path: DEFAULT_PROFILE_PIC,
        },
    )
    .unwrap();
    set_role(conn, id, role).unwrap();
    id
}

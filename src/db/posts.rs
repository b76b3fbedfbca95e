use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::models::{Media, Post};
use crate::error::{AppError, AppResult};

const POST_SELECT: &str = "SELECT p.id, p.title, p.description, p.budget, p.location,
        p.on_ground_members, p.created_by, u.username, p.created_at
     FROM posts p
     JOIN users u ON u.id = p.created_by";

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub description: String,
    pub budget: i64,
    pub location: String,
    pub on_ground_members: Option<String>,
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        budget: row.get(3)?,
        location: row.get(4)?,
        on_ground_members: row.get(5)?,
        created_by: row.get(6)?,
        author: row.get(7)?,
        created_at: row.get(8)?,
        media: Vec::new(),
    })
}

/// Rejects a budget that would push the running total past what SQLite
/// can sum.
pub fn insert(conn: &Connection, post: &NewPost, created_by: i64) -> AppResult<i64> {
    if total_budget(conn)?.checked_add(post.budget).is_none() {
        return Err(AppError::BadRequest(
            "Budget is too large: total budget would overflow".into(),
        ));
    }

    conn.execute(
        "INSERT INTO posts (title, description, budget, location, on_ground_members, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            post.title,
            post.description,
            post.budget,
            post.location,
            post.on_ground_members,
            created_by
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_media(conn: &Connection, post_id: i64, path: &str) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO media (post_id, path) VALUES (?1, ?2)",
        params![post_id, path],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn media_for(conn: &Connection, post_id: i64) -> AppResult<Vec<Media>> {
    let mut stmt =
        conn.prepare("SELECT id, post_id, path FROM media WHERE post_id = ?1 ORDER BY id")?;
    let media = stmt
        .query_map(params![post_id], |row| {
            Ok(Media {
                id: row.get(0)?,
                post_id: row.get(1)?,
                path: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(media)
}

/// Fills `media` for the given posts only.
fn attach_media(conn: &Connection, posts: &mut [Post]) -> AppResult<()> {
    if posts.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; posts.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT post_id, path FROM media WHERE post_id IN ({placeholders}) ORDER BY id"
    ))?;
    let rows = stmt.query_map(params_from_iter(posts.iter().map(|p| p.id)), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut by_post: HashMap<i64, Vec<String>> = HashMap::new();
    for row in rows {
        let (post_id, path) = row?;
        by_post.entry(post_id).or_default().push(path);
    }
    for post in posts.iter_mut() {
        post.media = by_post.remove(&post.id).unwrap_or_default();
    }
    Ok(())
}

/// Newest first. `limit` of `None` returns every post.
pub fn list(conn: &Connection, limit: Option<i64>) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} ORDER BY p.created_at DESC, p.id DESC LIMIT ?1"
    ))?;
    let mut posts = stmt
        .query_map(params![limit.unwrap_or(-1)], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    attach_media(conn, &mut posts)?;
    Ok(posts)
}

pub fn find(conn: &Connection, id: i64) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(&format!("{POST_SELECT} WHERE p.id = ?1"), params![id], post_from_row)
        .optional()?;
    let Some(mut post) = post else {
        return Ok(None);
    };
    post.media = media_for(conn, id)?.into_iter().map(|m| m.path).collect();
    Ok(Some(post))
}

pub fn exists(conn: &Connection, id: i64) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?)
}

pub fn total_budget(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COALESCE(SUM(budget), 0) FROM posts", [], |row| {
        row.get(0)
    })?)
}

/// Delete a post with its comments and media rows in one transaction.
///
/// Returns the recorded media paths so the caller can remove the files;
/// file removal happens after commit and never undoes the deletion.
pub fn delete_cascade(conn: &mut Connection, id: i64) -> AppResult<Vec<String>> {
    let tx = conn.transaction()?;

    if !exists(&tx, id)? {
        return Err(AppError::NotFound);
    }
    let paths = media_for(&tx, id)?.into_iter().map(|m| m.path).collect();

    tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])?;
    tx.execute("DELETE FROM media WHERE post_id = ?1", params![id])?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    tx.commit()?;

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::test_pool;
    use crate::db::users::insert_test_user;

    fn new_post(title: &str, budget: i64) -> NewPost {
        NewPost {
            title: title.to_string(),
            description: "Pick up litter along the river".to_string(),
            budget,
            location: "Riverside".to_string(),
            on_ground_members: Some("alice, bob".to_string()),
        }
    }

    #[test]
    fn list_is_newest_first_with_media() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let author = insert_test_user(&conn, "lead", Role::Leader);

        let first = insert(&conn, &new_post("Cleanup", 500), author).unwrap();
        let second = insert(&conn, &new_post("Tree planting", 250), author).unwrap();
        add_media(&conn, first, "posts/1_a.jpg").unwrap();
        add_media(&conn, first, "posts/1_b.jpg").unwrap();

        let posts = list(&conn, None).unwrap();
        assert_eq!(
            posts.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![second, first]
        );
        assert_eq!(posts[1].media, vec!["posts/1_a.jpg", "posts/1_b.jpg"]);
        assert!(posts[0].media.is_empty());
        assert_eq!(posts[0].author, "lead");

        assert_eq!(list(&conn, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn total_budget_sums_all_posts() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert_eq!(total_budget(&conn).unwrap(), 0);

        let author = insert_test_user(&conn, "lead", Role::Leader);
        insert(&conn, &new_post("Cleanup", 500), author).unwrap();
        insert(&conn, &new_post("Food drive", 120), author).unwrap();
        assert_eq!(total_budget(&conn).unwrap(), 620);
    }

    #[test]
    fn budget_that_would_overflow_the_total_is_rejected() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let author = insert_test_user(&conn, "lead", Role::Leader);

        insert(&conn, &new_post("Huge", i64::MAX), author).unwrap();
        let err = insert(&conn, &new_post("One more", 1), author).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        insert(&conn, &new_post("Free", 0), author).unwrap();

        assert_eq!(total_budget(&conn).unwrap(), i64::MAX);
        assert_eq!(list(&conn, None).unwrap().len(), 2);
    }

    #[test]
    fn limited_list_carries_only_its_own_media() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let author = insert_test_user(&conn, "lead", Role::Leader);
        let old = insert(&conn, &new_post("Old", 1), author).unwrap();
        let new = insert(&conn, &new_post("New", 1), author).unwrap();
        add_media(&conn, old, "posts/1_old.jpg").unwrap();
        add_media(&conn, new, "posts/2_new.jpg").unwrap();

        let latest = list(&conn, Some(1)).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, new);
        assert_eq!(latest[0].media, vec!["posts/2_new.jpg"]);
    }

    #[test]
    fn delete_cascade_removes_media_and_comments() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let author = insert_test_user(&conn, "lead", Role::Leader);
        let keep = insert(&conn, &new_post("Keep", 1), author).unwrap();
        let gone = insert(&conn, &new_post("Gone", 1), author).unwrap();
        add_media(&conn, gone, "posts/2_x.png").unwrap();
        add_media(&conn, keep, "posts/1_y.png").unwrap();
        for post in [keep, gone] {
            conn.execute(
                "INSERT INTO comments (post_id, user_id, comment_text) VALUES (?1, ?2, 'nice')",
                params![post, author],
            )
            .unwrap();
        }

        let paths = delete_cascade(&mut conn, gone).unwrap();
        assert_eq!(paths, vec!["posts/2_x.png"]);
        assert!(find(&conn, gone).unwrap().is_none());

        let remaining_media: i64 = conn
            .query_row("SELECT COUNT(*) FROM media WHERE post_id = ?1", params![gone], |r| r.get(0))
            .unwrap();
        let remaining_comments: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments WHERE post_id = ?1", params![gone], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining_media, 0);
        assert_eq!(remaining_comments, 0);

        let kept = find(&conn, keep).unwrap().unwrap();
        assert_eq!(kept.media, vec!["posts/1_y.png"]);
    }

    #[test]
    fn delete_cascade_unknown_post_is_not_found() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        assert!(matches!(delete_cascade(&mut conn, 7), Err(AppError::NotFound)));
    }
}

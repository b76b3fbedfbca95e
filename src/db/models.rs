use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Profile picture recorded for users who register without one.
pub const DEFAULT_PROFILE_PIC: &str = "profiles/default.png";

/// Storage format for every `created_at` column.
const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Member,
    #[serde(rename = "Co-Leader")]
    CoLeader,
    Leader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "Member",
            Role::CoLeader => "Co-Leader",
            Role::Leader => "Leader",
        }
    }

    /// Member -> Co-Leader. `None` when the role has no promotion.
    pub fn promoted(self) -> Option<Role> {
        match self {
            Role::Member => Some(Role::CoLeader),
            Role::CoLeader | Role::Leader => None,
        }
    }

    /// Co-Leader -> Member. `None` when the role has no demotion.
    pub fn demoted(self) -> Option<Role> {
        match self {
            Role::CoLeader => Some(Role::Member),
            Role::Member | Role::Leader => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Member" => Ok(Role::Member),
            "Co-Leader" => Ok(Role::CoLeader),
            "Leader" => Ok(Role::Leader),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub profile_pic_path: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub budget: i64,
    pub location: String,
    pub on_ground_members: Option<String>,
    pub created_by: i64,
    pub author: String,
    pub created_at: String,
    pub media: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Media {
    pub id: i64,
    pub post_id: i64,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub comment_text: String,
    pub author: String,
    pub author_profile_pic: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub id: i64,
    pub text: String,
    pub suggester_name: String,
    pub user_id: Option<i64>,
    pub created_at: String,
}

/// Reformat a stored timestamp; unparseable input is returned as-is.
pub fn format_db_time(db_time: &str, format: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, DB_TIME_FORMAT)
        .map(|dt| dt.format(format).to_string())
        .unwrap_or_else(|_| db_time.to_string())
}

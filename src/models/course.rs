use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub fullname: String,
    pub shortname: String,
    pub category: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// 0 for top-level categories.
    pub parent: i64,
    /// Ancestry such as `/1/4/9`, ending with the category's own id.
    pub path: String,
}

/// A user row as stored; `lastaccess` is a unix timestamp, 0 when never seen.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub lastaccess: i64,
    pub is_site_admin: bool,
}

impl User {
    pub fn fullname(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRow)]
pub struct UserCourse {
    pub user_id: i64,
    pub course_id: i64,
}

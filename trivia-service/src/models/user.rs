//! User accounts and the per-request authorized caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SUPPORT: &str = "support";
pub const ROLE_PLAYER: &str = "player";

/// Stored user account.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub profile_text: Option<String>,
    pub is_verified: bool,
    pub user_type_key: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
}

impl User {
    /// A fresh, unverified account as it looks right after registration.
    pub fn new(
        id: i64,
        email: String,
        display_name: String,
        password_hash: Option<String>,
        user_type_key: String,
    ) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            modified_at: None,
            is_archived: false,
            email,
            display_name,
            avatar_url: None,
            profile_text: None,
            is_verified: false,
            user_type_key,
            password_hash,
            last_login: None,
            is_banned: false,
            ban_reason: None,
        }
    }
}

/// Caller identity resolved from the access cookie. Lives for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizedUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_admin: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_support: bool,
}

impl From<&User> for AuthorizedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.display_name.clone(),
            is_admin: user.user_type_key == ROLE_ADMIN,
            is_support: user.user_type_key == ROLE_SUPPORT,
        }
    }
}

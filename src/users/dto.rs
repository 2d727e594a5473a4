use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;

/// Request body for registration. Missing fields deserialize as empty and
/// are reported by validation rather than by the JSON parser.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub user_id: Uuid,
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Public part of the user returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_date: Option<OffsetDateTime>,
    pub is_active: bool,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            created_date: u.created_at,
            last_login_date: u.last_login_at,
            is_active: u.is_active,
        }
    }
}

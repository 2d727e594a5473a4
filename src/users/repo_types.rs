use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,                        // trimmed and lowercased
    pub password_hash: String,                // argon2 PHC string, never exposed
    pub full_name: String,
    pub created_at: OffsetDateTime,           // UTC, immutable
    pub last_login_at: Option<OffsetDateTime>,
    pub is_active: bool,
}

/// Fields needed to insert a user; the store fills in the rest.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub created_at: OffsetDateTime,
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::tokens::TokenPurpose;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,                // stored trimmed and lowercased
    #[serde(skip_serializing)]
    pub password_hash: String,        // Argon2 hash, not exposed in JSON
    pub username: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_superuser: bool,
    pub is_oauth: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Optional profile fields, used both at registration and for updates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// Account flags only a superuser may change.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UserFlags {
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub is_superuser: Option<bool>,
}

/// Superuser edit of another account; `None` leaves a column as it is.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub profile: Profile,
    pub password_hash: Option<String>,
    pub flags: UserFlags,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
    pub is_superuser: bool,
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub purpose: TokenPurpose,
    pub expires_at: OffsetDateTime,
}

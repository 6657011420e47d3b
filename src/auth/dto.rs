use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Profile, User, UserFlags};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: Profile,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Superuser edit of an account. Unknown keys such as `email` are ignored.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(flatten)]
    pub profile: Profile,
    pub password: Option<String>,
    #[serde(flatten)]
    pub flags: UserFlags,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_superuser: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            phone: u.phone,
            address: u.address,
            city: u.city,
            state: u.state,
            postal_code: u.postal_code,
            is_active: u.is_active,
            is_verified: u.is_verified,
            is_superuser: u.is_superuser,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: &'static str,
    pub user_id: Uuid,
    pub is_verified: bool,
}

/// Body of the anti-enumeration endpoints; identical whether or not the email exists.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub email: String,
}

impl AcceptedResponse {
    pub fn forgot_password(email: String) -> Self {
        Self {
            status: "success",
            message: "If the email exists, password reset instructions will be sent",
            email,
        }
    }

    pub fn verification_requested(email: String) -> Self {
        Self {
            status: "success",
            message: "If the account exists and is unverified, a verification email will be sent",
            email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            username: Some("tester".into()),
            phone: None,
            address: None,
            city: None,
            state: None,
            postal_code: None,
            is_active: true,
            is_verified: true,
            is_superuser: false,
            is_oauth: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn public_user_never_contains_the_hash() {
        let json = serde_json::to_string(&PublicUser::from(sample_user())).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn user_record_skips_hash_when_serialized() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn register_request_accepts_flat_profile_fields() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "pw1",
            "username": "alice",
            "city": "Lisbon"
        }))
        .unwrap();
        assert_eq!(req.profile.username.as_deref(), Some("alice"));
        assert_eq!(req.profile.city.as_deref(), Some("Lisbon"));
        assert!(req.profile.phone.is_none());
    }

    #[test]
    fn update_user_request_splits_profile_flags_and_password() {
        let req: UpdateUserRequest = serde_json::from_value(serde_json::json!({
            "phone": "555",
            "password": "new-pw",
            "is_superuser": true,
            "email": "ignored@x.com"
        }))
        .unwrap();
        assert_eq!(req.profile.phone.as_deref(), Some("555"));
        assert_eq!(req.password.as_deref(), Some("new-pw"));
        assert_eq!(req.flags.is_superuser, Some(true));
        assert_eq!(req.flags.is_active, None);
    }
}

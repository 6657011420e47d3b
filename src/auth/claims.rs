use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried in the access token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Superuser,
}

impl Role {
    pub fn for_superuser(is_superuser: bool) -> Self {
        if is_superuser {
            Role::Superuser
        } else {
            Role::User
        }
    }
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,    // user ID
    pub role: Role,
    pub iat: usize,   // issued at (unix timestamp)
    pub exp: usize,   // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn is_superuser(&self) -> bool {
        self.role == Role::Superuser
    }
}

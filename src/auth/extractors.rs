use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::claims::Claims;
use super::guard::bearer_claims;
use super::jwt::JwtKeys;
use crate::error::AppError;

/// Extracts and validates the access token of any authenticated user.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        bearer_claims(&keys, &parts.headers).map(AuthUser)
    }
}

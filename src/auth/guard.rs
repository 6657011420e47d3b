use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::claims::Claims;
use super::jwt::JwtKeys;
use crate::error::AppError;

/// Validates the `Authorization: Bearer <jwt>` header.
pub fn bearer_claims(keys: &JwtKeys, headers: &HeaderMap) -> Result<Claims, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

    keys.verify(token.trim()).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        AppError::Unauthorized("Invalid or expired token".into())
    })
}

pub fn ensure_superuser(claims: &Claims) -> Result<(), AppError> {
    if claims.is_superuser() {
        Ok(())
    } else {
        warn!(user_id = %claims.sub, "superuser route refused");
        Err(AppError::Forbidden("Superuser privileges required".into()))
    }
}

/// Route layer for superuser-only routes. On success the validated
/// `Claims` are available to the handler as an `Extension`.
pub async fn require_superuser(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = bearer_claims(&keys, req.headers())?;
    ensure_superuser(&claims)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

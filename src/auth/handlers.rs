use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AcceptedResponse, EmailRequest, LoginRequest, LoginResponse, PublicUser, RegisterRequest,
            ResetPasswordRequest, ResetPasswordResponse, UpdateUserRequest, VerifyQuery, VerifyResponse,
        },
        extractors::AuthUser,
        guard::require_superuser,
        jwt::JwtKeys,
        repo_types::Profile,
        Claims,
    },
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", get(verify))
        .route("/auth/request-verify-token", post(request_verify_token))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn user_routes(keys: JwtKeys) -> Router<AppState> {
    let admin = Router::new()
        .route("/users/:id", get(get_user).patch(update_user).delete(delete_user))
        .route_layer(middleware::from_fn_with_state(keys, require_superuser));

    Router::new()
        .route("/users/me", get(get_me).patch(patch_me))
        .merge(admin)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = state
        .auth
        .register(&payload.email, &payload.password, payload.profile)
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (access_token, user) = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.auth.access_ttl_secs(),
        user: user.into(),
    }))
}

#[instrument(skip(state, query))]
pub async fn verify(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<VerifyQuery>,
) -> Result<Json<VerifyResponse>, AppError> {
    let token = query
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("token query parameter is required".into()))?;
    let user = state.auth.verify_email(&token).await?;
    Ok(Json(VerifyResponse {
        message: "Email verified successfully",
        user_id: user.id,
        is_verified: user.is_verified,
    }))
}

#[instrument(skip(state, payload))]
pub async fn request_verify_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<EmailRequest>,
) -> (StatusCode, Json<AcceptedResponse>) {
    state.auth.request_verification(&payload.email).await;
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse::verification_requested(payload.email)),
    )
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<EmailRequest>,
) -> (StatusCode, Json<AcceptedResponse>) {
    state.auth.forgot_password(&payload.email).await;
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse::forgot_password(payload.email)),
    )
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, AppError> {
    let user = state
        .auth
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(Json(ResetPasswordResponse {
        status: "success",
        message: "Password has been reset successfully",
        user_id: user.id,
    }))
}

#[instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(state.auth.me(claims.sub).await?.into()))
}

#[instrument(skip(state, claims, payload), fields(user_id = %claims.sub))]
pub async fn patch_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    AppJson(payload): AppJson<Profile>,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(state.auth.update_profile(claims.sub, payload).await?.into()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(state.auth.get_user(id).await?.into()))
}

#[instrument(skip(state, claims, payload), fields(admin = %claims.sub))]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .auth
        .update_user(id, payload.profile, payload.password.as_deref(), payload.flags)
        .await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, claims), fields(admin = %claims.sub))]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.auth.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

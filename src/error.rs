use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::repo::StoreError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Email already registered")]
    DuplicateEmail,
    /// Deliberately vague: never says whether the email or the password was wrong.
    #[error("Invalid credentials")]
    AuthenticationError,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error_type: &'static str,
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DuplicateEmail | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::AuthenticationError | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::DuplicateEmail => "duplicate_email",
            Self::AuthenticationError => "authentication_error",
            Self::InvalidOrExpiredToken => "invalid_or_expired_token",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "server_error",
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let message = match self {
            // Internals stay in the logs.
            Self::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            status: "error",
            error_type: self.error_type(),
            message,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::Database(e) => AppError::Internal(anyhow::Error::new(e).context("database")),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Not found".into()),
            e => AppError::Internal(anyhow::Error::new(e).context("database")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(r: JsonRejection) -> Self {
        AppError::Validation(r.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(r: PathRejection) -> Self {
        AppError::Validation(r.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(r: QueryRejection) -> Self {
        AppError::Validation(r.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(e) = &self {
            error!(error = ?e, "request failed");
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}

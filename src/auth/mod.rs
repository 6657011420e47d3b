use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub(crate) mod extractors;
pub mod guard;
pub mod handlers;
pub mod jwt;
#[cfg(test)]
pub(crate) mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod tokens;

pub use claims::{Claims, Role};

pub fn router(keys: jwt::JwtKeys) -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::user_routes(keys))
}

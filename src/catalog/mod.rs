mod dto;
pub mod handlers;
mod repo;
pub mod repo_types;

use crate::auth::jwt::JwtKeys;
use crate::state::AppState;
use axum::Router;

pub fn router(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes(keys))
}

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{guard::require_superuser, jwt::JwtKeys, Claims},
    db::{is_foreign_key_violation, is_unique_violation},
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
};

use super::dto::{CategoryInput, ProductFilter, ProductInput};
use super::repo;
use super::repo_types::{Category, Product};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/:id", get(get_category))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

pub fn write_routes(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .route("/categories", post(create_category))
        .route("/categories/:id", put(update_category).delete(delete_category))
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .route_layer(middleware::from_fn_with_state(keys, require_superuser))
}

fn category_write_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Category name already exists".into())
    } else {
        e.into()
    }
}

fn product_write_error(e: sqlx::Error) -> AppError {
    if is_foreign_key_violation(&e) {
        AppError::Validation("Unknown category".into())
    } else {
        e.into()
    }
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(repo::list_categories(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Category>, AppError> {
    repo::get_category(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Category not found".into()))
}

#[instrument(skip(state, claims, input), fields(admin = %claims.sub))]
pub async fn create_category(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(input): AppJson<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let input = input.validate()?;
    let category = repo::insert_category(&state.db, &input)
        .await
        .map_err(category_write_error)?;
    info!(category_id = %category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, claims, input), fields(admin = %claims.sub))]
pub async fn update_category(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    let input = input.validate()?;
    repo::update_category(&state.db, id, &input)
        .await
        .map_err(category_write_error)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Category not found".into()))
}

#[instrument(skip(state, claims), fields(admin = %claims.sub))]
pub async fn delete_category(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if repo::delete_category(&state.db, id).await? {
        info!(category_id = %id, "category deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Category not found".into()))
    }
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<ProductFilter>,
) -> Result<Json<Vec<Product>>, AppError> {
    let (limit, offset) = filter.bounds();
    Ok(Json(
        repo::list_products(&state.db, filter.category_id, limit, offset).await?,
    ))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Product>, AppError> {
    repo::get_product(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

#[instrument(skip(state, claims, input), fields(admin = %claims.sub))]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(input): AppJson<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let input = input.validate()?;
    let product = repo::insert_product(&state.db, &input)
        .await
        .map_err(product_write_error)?;
    info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, claims, input), fields(admin = %claims.sub))]
pub async fn update_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<ProductInput>,
) -> Result<Json<Product>, AppError> {
    let input = input.validate()?;
    repo::update_product(&state.db, id, &input)
        .await
        .map_err(product_write_error)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

#[instrument(skip(state, claims), fields(admin = %claims.sub))]
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if repo::delete_product(&state.db, id).await? {
        info!(product_id = %id, "product deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Product not found".into()))
    }
}

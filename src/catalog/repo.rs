use sqlx::PgPool;
use uuid::Uuid;

use super::dto::{CategoryInput, ProductInput};
use super::repo_types::{Category, Product};

const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, category_id, name, description, price_cents, stock, created_at, updated_at";

pub async fn list_categories(db: &PgPool) -> sqlx::Result<Vec<Category>> {
    sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"
    ))
    .fetch_all(db)
    .await
}

pub async fn get_category(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Category>> {
    sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_category(db: &PgPool, input: &CategoryInput) -> sqlx::Result<Category> {
    sqlx::query_as::<_, Category>(&format!(
        r#"
        INSERT INTO categories (id, name, description)
        VALUES ($1, $2, $3)
        RETURNING {CATEGORY_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&input.name)
    .bind(&input.description)
    .fetch_one(db)
    .await
}

pub async fn update_category(
    db: &PgPool,
    id: Uuid,
    input: &CategoryInput,
) -> sqlx::Result<Option<Category>> {
    sqlx::query_as::<_, Category>(&format!(
        r#"
        UPDATE categories
        SET name = $2, description = $3, updated_at = now()
        WHERE id = $1
        RETURNING {CATEGORY_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&input.name)
    .bind(&input.description)
    .fetch_optional(db)
    .await
}

pub async fn delete_category(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn list_products(
    db: &PgPool,
    category_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Product>> {
    sqlx::query_as::<_, Product>(&format!(
        r#"
        SELECT {PRODUCT_COLUMNS}
        FROM products
        WHERE ($1::uuid IS NULL OR category_id = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(category_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn get_product(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_product(db: &PgPool, input: &ProductInput) -> sqlx::Result<Product> {
    sqlx::query_as::<_, Product>(&format!(
        r#"
        INSERT INTO products (id, category_id, name, description, price_cents, stock)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(input.category_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price_cents)
    .bind(input.stock)
    .fetch_one(db)
    .await
}

pub async fn update_product(
    db: &PgPool,
    id: Uuid,
    input: &ProductInput,
) -> sqlx::Result<Option<Product>> {
    sqlx::query_as::<_, Product>(&format!(
        r#"
        UPDATE products
        SET category_id = $2, name = $3, description = $4,
            price_cents = $5, stock = $6, updated_at = now()
        WHERE id = $1
        RETURNING {PRODUCT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(input.category_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price_cents)
    .bind(input.stock)
    .fetch_optional(db)
    .await
}

pub async fn delete_product(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

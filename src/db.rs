use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|c| c.as_ref() == code),
        _ => false,
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23505")
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_code(err, "23503")
}

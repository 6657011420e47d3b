use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryInput {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(AppError::Validation("Category name must not be empty".into()));
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i32,
}

impl ProductInput {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(AppError::Validation("Product name must not be empty".into()));
        }
        if self.price_cents < 0 {
            return Err(AppError::Validation("Price must not be negative".into()));
        }
        if self.stock < 0 {
            return Err(AppError::Validation("Stock must not be negative".into()));
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl ProductFilter {
    /// Limit clamped to 1..=200, offset to non-negative.
    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, 200), self.offset.max(0))
    }
}

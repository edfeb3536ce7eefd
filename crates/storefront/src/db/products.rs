//! Catalog products.

use sqlx::PgPool;
use tracing::instrument;

use la_red_core::{ProductId, Tokens};

use super::RepositoryError;
use crate::models::Product;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    price_tokens: Tokens,
    image: Option<String>,
    category: String,
    active: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price_tokens: row.price_tokens,
            image: row.image,
            category: row.category,
            active: row.active,
        }
    }
}

/// Fields for creating or replacing a catalog product.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProductUpsert {
    /// Existing id to replace; `None` inserts a new product.
    #[serde(default)]
    pub id: Option<ProductId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_tokens: Tokens,
    #[serde(default)]
    pub image: Option<String>,
    pub category: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Repository for `products`.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active products, optionally restricted to one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_active(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price_tokens, image, category, active
            FROM storefront.products
            WHERE active AND ($1::TEXT IS NULL OR category = $1)
            ORDER BY category, name
            ",
        )
        .bind(category)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price_tokens, image, category, active
            FROM storefront.products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Insert a product, or replace it when `id` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `id` is set but does not exist.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn upsert(&self, product: &ProductUpsert) -> Result<Product, RepositoryError> {
        let row = match product.id {
            Some(id) => sqlx::query_as::<_, ProductRow>(
                r"
                UPDATE storefront.products
                SET name = $2, description = $3, price_tokens = $4,
                    image = $5, category = $6, active = $7
                WHERE id = $1
                RETURNING id, name, description, price_tokens, image, category, active
                ",
            )
            .bind(id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price_tokens)
            .bind(&product.image)
            .bind(&product.category)
            .bind(product.active)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?,
            None => {
                sqlx::query_as::<_, ProductRow>(
                    r"
                    INSERT INTO storefront.products
                        (name, description, price_tokens, image, category, active)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING id, name, description, price_tokens, image, category, active
                    ",
                )
                .bind(&product.name)
                .bind(&product.description)
                .bind(product.price_tokens)
                .bind(&product.image)
                .bind(&product.category)
                .bind(product.active)
                .fetch_one(self.pool)
                .await?
            }
        };

        Ok(Product::from(row))
    }
}

//! Member wishlists.

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use la_red_core::{LineId, ProductId, Tokens, UserId};

use super::RepositoryError;
use crate::models::WishlistItem;

#[derive(sqlx::FromRow)]
struct WishlistRow {
    id: Uuid,
    product_id: ProductId,
    name: String,
    price_tokens: Tokens,
    image: Option<String>,
    category: String,
}

impl From<WishlistRow> for WishlistItem {
    fn from(row: WishlistRow) -> Self {
        Self {
            id: LineId::Remote(row.id),
            product_id: row.product_id,
            name: row.name,
            price_tokens: row.price_tokens,
            image: row.image,
            category: row.category,
        }
    }
}

/// Repository for `wishlist_items`.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's wishlist joined with product data.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistRow>(
            r"
            SELECT w.id, w.product_id, p.name, p.price_tokens, p.image, p.category
            FROM storefront.wishlist_items w
            JOIN storefront.products p ON p.id = w.product_id
            WHERE w.user_id = $1
            ORDER BY w.added_at ASC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(WishlistItem::from).collect())
    }

    /// Add a product to the wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product is already present.
    #[instrument(skip(self))]
    pub async fn insert(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Uuid, RepositoryError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r"
            INSERT INTO storefront.wishlist_items (user_id, product_id)
            VALUES ($1, $2)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "wishlist entry"))?;

        Ok(id)
    }

    /// Remove an entry. Removing a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: UserId, entry_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            DELETE FROM storefront.wishlist_items
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(entry_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

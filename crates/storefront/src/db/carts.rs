//! Member carts: one `carts` container per user, lines in `cart_items`.

use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use la_red_core::{CartId, LineId, ProductId, Tokens, UserId};

use super::RepositoryError;
use crate::models::CartItem;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: Uuid,
    product_id: ProductId,
    name: String,
    price_tokens: Tokens,
    quantity: i32,
    image: Option<String>,
    category: String,
}

impl TryFrom<CartLineRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "cart line {} has quantity {}",
                    row.id, row.quantity
                ))
            })?;

        Ok(Self {
            id: LineId::Remote(row.id),
            product_id: row.product_id,
            name: row.name,
            price_tokens: row.price_tokens,
            quantity,
            image: row.image,
            category: row.category,
        })
    }
}

/// Clamp a quantity into the `INTEGER` column range.
pub(crate) fn quantity_param(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

/// Repository for cart containers and their lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the user's cart container.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_cart(&self, user_id: UserId) -> Result<Option<CartId>, RepositoryError> {
        let row: Option<(CartId,)> = sqlx::query_as(
            r"
            SELECT id FROM storefront.carts WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Create the user's cart container.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a cart.
    #[instrument(skip(self))]
    pub async fn create_cart(&self, user_id: UserId) -> Result<CartId, RepositoryError> {
        let (id,): (CartId,) = sqlx::query_as(
            r"
            INSERT INTO storefront.carts (user_id)
            VALUES ($1)
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "cart"))?;

        debug!(cart_id = %id, "Created cart");
        Ok(id)
    }

    /// Load a cart's lines joined with their products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored quantity is invalid.
    pub async fn list_lines(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.product_id, p.name, p.price_tokens, ci.quantity,
                   p.image, p.category
            FROM storefront.cart_items ci
            JOIN storefront.products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.added_at ASC
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartItem::try_from).collect()
    }

    /// Insert a line and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product is already in the cart.
    #[instrument(skip(self))]
    pub async fn insert_line(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Uuid, RepositoryError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r"
            INSERT INTO storefront.cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity_param(quantity))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "cart line"))?;

        Ok(id)
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    #[instrument(skip(self))]
    pub async fn update_line(
        &self,
        cart_id: CartId,
        line_id: Uuid,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.cart_items
            SET quantity = $1
            WHERE id = $2 AND cart_id = $3
            ",
        )
        .bind(quantity_param(quantity))
        .bind(line_id)
        .bind(cart_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a line. Deleting a missing line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn delete_line(&self, cart_id: CartId, line_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            DELETE FROM storefront.cart_items
            WHERE id = $1 AND cart_id = $2
            ",
        )
        .bind(line_id)
        .bind(cart_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete every line in the cart, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn clear_lines(&self, cart_id: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_items WHERE cart_id = $1
            ",
        )
        .bind(cart_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

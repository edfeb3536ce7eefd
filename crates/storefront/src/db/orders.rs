//! Orders and the statements checkout runs inside its transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use la_red_core::{AddressId, OrderId, OrderStatus, ProductId, Tokens, UserId};

use super::RepositoryError;
use super::carts::quantity_param;
use crate::models::{Order, OrderItem};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: String,
    total_tokens: Tokens,
    address_id: Option<AddressId>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: ProductId,
    name: String,
    price_tokens: Tokens,
    quantity: i32,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            status,
            total_tokens: self.total_tokens,
            address_id: self.address_id,
            created_at: self.created_at,
            items,
        })
    }
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "order {} has quantity {}",
                row.order_id, row.quantity
            ))
        })?;

        Ok(Self {
            product_id: row.product_id,
            name: row.name,
            price_tokens: row.price_tokens,
            quantity,
        })
    }
}

/// Repository for reading orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's orders, newest first, with their items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, status, total_tokens, address_id, created_at
            FROM storefront.orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, product_id, name, price_tokens, quantity
            FROM storefront.order_items
            WHERE order_id = ANY($1)
            ORDER BY name
            ",
        )
        .bind(ids.iter().map(OrderId::as_uuid).collect::<Vec<_>>())
        .fetch_all(self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id = row.order_id;
            items_by_order
                .entry(order_id)
                .or_default()
                .push(OrderItem::try_from(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    /// Get one of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, status, total_tokens, address_id, created_at
            FROM storefront.orders
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, product_id, name, price_tokens, quantity
            FROM storefront.order_items
            WHERE order_id = $1
            ORDER BY name
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(OrderItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        row.into_order(items).map(Some)
    }
}

// =============================================================================
// Checkout statements (run on a transaction connection)
// =============================================================================

/// Lock the user's balance row for the rest of the transaction.
pub(crate) async fn lock_balance(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<Tokens>, RepositoryError> {
    let row: Option<(Tokens,)> = sqlx::query_as(
        r"
        SELECT balance FROM storefront.token_balances
        WHERE user_id = $1
        FOR UPDATE
        ",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|(balance,)| balance))
}

#[derive(sqlx::FromRow)]
struct CheckoutLineRow {
    product_id: ProductId,
    name: String,
    price_tokens: Tokens,
    quantity: i32,
}

/// Current cart contents priced from the catalog.
pub(crate) async fn priced_cart_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, CheckoutLineRow>(
        r"
        SELECT ci.product_id, p.name, p.price_tokens, ci.quantity
        FROM storefront.carts c
        JOIN storefront.cart_items ci ON ci.cart_id = c.id
        JOIN storefront.products p ON p.id = ci.product_id
        WHERE c.user_id = $1
        ORDER BY ci.added_at ASC
        ",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|row| {
            let quantity = u32::try_from(row.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!(
                    "cart line for product {} has quantity {}",
                    row.product_id, row.quantity
                ))
            })?;
            Ok(OrderItem {
                product_id: row.product_id,
                name: row.name,
                price_tokens: row.price_tokens,
                quantity,
            })
        })
        .collect()
}

pub(crate) async fn debit_balance(
    conn: &mut PgConnection,
    user_id: UserId,
    amount: Tokens,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE storefront.token_balances
        SET balance = balance - $1, updated_at = now()
        WHERE user_id = $2
        ",
    )
    .bind(amount)
    .bind(user_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Insert a paid order with its items.
pub(crate) async fn insert_paid_order(
    conn: &mut PgConnection,
    user_id: UserId,
    address_id: Option<AddressId>,
    total: Tokens,
    items: Vec<OrderItem>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        INSERT INTO storefront.orders (user_id, status, total_tokens, address_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, status, total_tokens, address_id, created_at
        ",
    )
    .bind(user_id)
    .bind(OrderStatus::Paid.as_str())
    .bind(total)
    .bind(address_id)
    .fetch_one(&mut *conn)
    .await?;

    for item in &items {
        sqlx::query(
            r"
            INSERT INTO storefront.order_items (order_id, product_id, name, price_tokens, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(row.id)
        .bind(item.product_id)
        .bind(&item.name)
        .bind(item.price_tokens)
        .bind(quantity_param(item.quantity))
        .execute(&mut *conn)
        .await?;
    }

    row.into_order(items)
}

pub(crate) async fn clear_cart_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        DELETE FROM storefront.cart_items ci
        USING storefront.carts c
        WHERE ci.cart_id = c.id AND c.user_id = $1
        ",
    )
    .bind(user_id)
    .execute(conn)
    .await?;

    Ok(())
}

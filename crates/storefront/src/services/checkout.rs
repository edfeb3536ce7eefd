//! Paying for a member cart with tokens.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use la_red_core::{AddressId, Tokens, UserId};

use crate::db::orders::{
    clear_cart_for_user, debit_balance, insert_paid_order, lock_balance, priced_cart_lines,
};
use crate::db::{AddressRepository, RepositoryError};
use crate::models::Order;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("insufficient tokens: need {needed}, have {available}")]
    InsufficientTokens { needed: Tokens, available: Tokens },

    #[error("unknown shipping address")]
    UnknownAddress,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// Turns a member's cart into a paid order.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Charge the cart total to the user's balance and record the order.
    ///
    /// Runs in one transaction with the balance row locked, so concurrent
    /// checkouts by the same user cannot both spend the same tokens. Items
    /// are priced from the catalog at checkout time.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the cart has no lines.
    /// Returns `CheckoutError::InsufficientTokens` if the balance is short.
    /// Returns `CheckoutError::UnknownAddress` if `address_id` is not the user's.
    #[instrument(skip(self))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        address_id: Option<AddressId>,
    ) -> Result<Order, CheckoutError> {
        if let Some(id) = address_id
            && AddressRepository::new(self.pool)
                .get(user_id, id)
                .await?
                .is_none()
        {
            return Err(CheckoutError::UnknownAddress);
        }

        let mut tx = self.pool.begin().await?;

        let available = lock_balance(&mut tx, user_id).await?.unwrap_or(Tokens::ZERO);
        let items = priced_cart_lines(&mut tx, user_id).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let needed: Tokens = items
            .iter()
            .map(|item| item.price_tokens.times(item.quantity))
            .sum();
        if available.checked_sub(needed).is_none() {
            return Err(CheckoutError::InsufficientTokens { needed, available });
        }

        debit_balance(&mut tx, user_id, needed).await?;
        let order = insert_paid_order(&mut tx, user_id, address_id, needed, items).await?;
        clear_cart_for_user(&mut tx, user_id).await?;
        tx.commit().await?;

        info!(order_id = %order.id, total = %needed, "Order paid");
        Ok(order)
    }
}

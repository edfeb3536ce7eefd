//! Database operations for storefront `PostgreSQL`.
//!
//! This is the "remote data client" of the storefront: every table lives
//! in the `storefront` schema and is scoped by `user_id`, `cart_id` or
//! `order_id` foreign keys.
//!
//! ## Tables
//!
//! - `users`, `user_passwords` - Password sign-in
//! - `profiles`, `token_balances` - Created lazily on first sign-in
//! - `products` - Catalog
//! - `carts`, `cart_items` - Member carts (one cart container per user)
//! - `wishlist_items` - Member wishlists
//! - `addresses` - Shipping addresses
//! - `orders`, `order_items` - Token-paid orders
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p la-red-cli -- migrate
//! ```
//!
//! Queries are runtime-checked (`sqlx::query_as` with `FromRow` rows) so
//! the crate builds without a live database.

pub mod addresses;
pub mod carts;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use carts::CartRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use profiles::{PgAccountStore, ProfileRepository};
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }

    /// Whether this is a unique-constraint violation.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

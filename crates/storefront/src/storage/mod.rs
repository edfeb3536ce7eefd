//! Cart and wishlist backing stores.
//!
//! A visitor's cart lives in one of two places depending on whether they
//! are signed in:
//!
//! - [`LocalStore`] keeps JSON arrays in a string key/value store. In the
//!   server that store is the visitor's session ([`SessionKeyValueStore`]).
//! - [`RemoteStore`] keeps rows in `PostgreSQL`, scoped to one user.
//!
//! Both implement [`CartStore`]; the provider in
//! [`crate::services::cart`] picks one per session and never inspects
//! which it holds beyond [`CartStore::kind`].

mod local;
mod memory;
mod remote;
mod session;

pub use local::{KeyValueStore, LocalStore, MemoryKeyValueStore};
pub use memory::MemoryCartStore;
pub use remote::RemoteStore;
pub use session::SessionKeyValueStore;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;

use la_red_core::LineId;

use crate::db::RepositoryError;
use crate::models::{CartItem, CurrentUser, ProductSnapshot, WishlistItem};

/// Which persistence mode a store implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Guest,
    Member,
}

/// Errors returned by [`CartStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Remote store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Session backend failure.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Guest data could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The line id does not exist in this store.
    #[error("cart line {0} not found")]
    MissingLine(LineId),

    /// The operation needs a signed-in member.
    #[error("sign in required")]
    MemberRequired,
}

impl StoreError {
    /// Whether the write lost a race with an identical insert.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Repository(e) if e.is_conflict())
    }
}

/// Storage operations shared by guest and member mode.
///
/// Implementations only persist; deduplication by product and quantity
/// bookkeeping belong to the provider.
#[async_trait]
pub trait CartStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    async fn load_cart(&self) -> Result<Vec<CartItem>, StoreError>;

    /// Persist a new line and return it with its storage id.
    async fn insert_line(
        &self,
        product: ProductSnapshot,
        quantity: u32,
    ) -> Result<CartItem, StoreError>;

    async fn update_line(&self, id: LineId, quantity: u32) -> Result<(), StoreError>;

    /// Delete a line. Unknown ids are ignored.
    async fn delete_line(&self, id: LineId) -> Result<(), StoreError>;

    async fn clear_cart(&self) -> Result<(), StoreError>;

    async fn load_wishlist(&self) -> Result<Vec<WishlistItem>, StoreError>;

    async fn insert_wishlist(&self, product: ProductSnapshot) -> Result<WishlistItem, StoreError>;

    /// Delete a wishlist entry. Unknown ids are ignored.
    async fn delete_wishlist(&self, id: LineId) -> Result<(), StoreError>;
}

/// Pick the store for a visitor: their rows when signed in, otherwise the
/// guest arrays in their session.
#[must_use]
pub fn store_for(pool: &PgPool, session: &Session, user: Option<&CurrentUser>) -> Box<dyn CartStore> {
    match user {
        Some(user) => Box::new(RemoteStore::new(pool.clone(), user.id)),
        None => Box::new(guest_store(session)),
    }
}

/// The guest store in a visitor's session, regardless of sign-in state.
#[must_use]
pub fn guest_store(session: &Session) -> LocalStore<SessionKeyValueStore> {
    LocalStore::new(SessionKeyValueStore::new(session.clone()))
}

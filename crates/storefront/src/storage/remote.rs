//! Member-mode store over `PostgreSQL`.

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use la_red_core::{CartId, LineId, UserId};

use super::{CartStore, StoreError, StoreKind};
use crate::db::{CartRepository, RepositoryError, WishlistRepository};
use crate::models::{CartItem, ProductSnapshot, WishlistItem};

/// Cart and wishlist rows belonging to one user.
///
/// The user's `carts` container is resolved on first use and cached for
/// the lifetime of the store.
pub struct RemoteStore {
    pool: PgPool,
    user_id: UserId,
    cart_id: OnceCell<CartId>,
}

impl RemoteStore {
    #[must_use]
    pub fn new(pool: PgPool, user_id: UserId) -> Self {
        Self {
            pool,
            user_id,
            cart_id: OnceCell::new(),
        }
    }

    async fn cart_id(&self) -> Result<CartId, StoreError> {
        self.cart_id
            .get_or_try_init(|| resolve_cart(&self.pool, self.user_id))
            .await
            .copied()
    }
}

/// Find the user's cart, creating it when missing.
#[instrument(skip(pool))]
async fn resolve_cart(pool: &PgPool, user_id: UserId) -> Result<CartId, StoreError> {
    let carts = CartRepository::new(pool);
    if let Some(id) = carts.find_cart(user_id).await? {
        return Ok(id);
    }

    match carts.create_cart(user_id).await {
        Ok(id) => Ok(id),
        Err(RepositoryError::Conflict(_)) => {
            // Another request created it between our select and insert.
            debug!("Cart created concurrently, re-selecting");
            carts
                .find_cart(user_id)
                .await?
                .ok_or(StoreError::Repository(RepositoryError::NotFound))
        }
        Err(e) => Err(e.into()),
    }
}

fn remote_id(id: LineId) -> Result<uuid::Uuid, StoreError> {
    id.as_remote().ok_or(StoreError::MissingLine(id))
}

#[async_trait]
impl CartStore for RemoteStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Member
    }

    async fn load_cart(&self) -> Result<Vec<CartItem>, StoreError> {
        let cart_id = self.cart_id().await?;
        Ok(CartRepository::new(&self.pool).list_lines(cart_id).await?)
    }

    async fn insert_line(
        &self,
        product: ProductSnapshot,
        quantity: u32,
    ) -> Result<CartItem, StoreError> {
        let cart_id = self.cart_id().await?;
        let id = CartRepository::new(&self.pool)
            .insert_line(cart_id, product.product_id, quantity)
            .await?;

        Ok(CartItem::from_snapshot(LineId::Remote(id), product, quantity))
    }

    async fn update_line(&self, id: LineId, quantity: u32) -> Result<(), StoreError> {
        let line_id = remote_id(id)?;
        let cart_id = self.cart_id().await?;

        CartRepository::new(&self.pool)
            .update_line(cart_id, line_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => StoreError::MissingLine(id),
                other => other.into(),
            })
    }

    async fn delete_line(&self, id: LineId) -> Result<(), StoreError> {
        let Some(line_id) = id.as_remote() else {
            return Ok(());
        };
        let cart_id = self.cart_id().await?;

        Ok(CartRepository::new(&self.pool)
            .delete_line(cart_id, line_id)
            .await?)
    }

    async fn clear_cart(&self) -> Result<(), StoreError> {
        let cart_id = self.cart_id().await?;
        let removed = CartRepository::new(&self.pool).clear_lines(cart_id).await?;
        debug!(user_id = %self.user_id, removed, "Cleared member cart");
        Ok(())
    }

    async fn load_wishlist(&self) -> Result<Vec<WishlistItem>, StoreError> {
        Ok(WishlistRepository::new(&self.pool).list(self.user_id).await?)
    }

    async fn insert_wishlist(&self, product: ProductSnapshot) -> Result<WishlistItem, StoreError> {
        let id = WishlistRepository::new(&self.pool)
            .insert(self.user_id, product.product_id)
            .await?;

        Ok(WishlistItem::from_snapshot(LineId::Remote(id), product))
    }

    async fn delete_wishlist(&self, id: LineId) -> Result<(), StoreError> {
        let Some(entry_id) = id.as_remote() else {
            return Ok(());
        };

        Ok(WishlistRepository::new(&self.pool)
            .delete(self.user_id, entry_id)
            .await?)
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use la_red_core::LineId;

use super::{CartStore, StoreError, StoreKind};
use crate::db::RepositoryError;
use crate::models::{CartItem, ProductSnapshot, WishlistItem};

#[derive(Debug, Default)]
struct Contents {
    cart: Vec<CartItem>,
    wishlist: Vec<WishlistItem>,
    unavailable: bool,
    writes_before_failure: Option<usize>,
}

/// Member-mode store held in memory.
///
/// Ids are `LineId::Remote` like real rows. Clones share contents, and
/// [`set_unavailable`](Self::set_unavailable) makes every call fail the
/// way an unreachable database would.
/// [`fail_write_after`](Self::fail_write_after) fails a single write.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartStore {
    contents: Arc<Mutex<Contents>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Let `successes` more writes through, then fail the next one.
    pub fn fail_write_after(&self, successes: usize) {
        self.lock().writes_before_failure = Some(successes);
    }

    fn lock(&self) -> MutexGuard<'_, Contents> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self) -> Result<MutexGuard<'_, Contents>, StoreError> {
        let guard = self.lock();
        if guard.unavailable {
            return Err(unreachable_database());
        }
        Ok(guard)
    }

    fn writable(&self) -> Result<MutexGuard<'_, Contents>, StoreError> {
        let mut guard = self.available()?;
        match guard.writes_before_failure {
            Some(0) => {
                guard.writes_before_failure = None;
                Err(unreachable_database())
            }
            Some(n) => {
                guard.writes_before_failure = Some(n - 1);
                Ok(guard)
            }
            None => Ok(guard),
        }
    }
}

fn unreachable_database() -> StoreError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut).into()
}

#[async_trait]
impl CartStore for MemoryCartStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Member
    }

    async fn load_cart(&self) -> Result<Vec<CartItem>, StoreError> {
        Ok(self.available()?.cart.clone())
    }

    async fn insert_line(
        &self,
        product: ProductSnapshot,
        quantity: u32,
    ) -> Result<CartItem, StoreError> {
        let mut contents = self.writable()?;
        if contents
            .cart
            .iter()
            .any(|item| item.product_id == product.product_id)
        {
            return Err(RepositoryError::Conflict("cart line already exists".to_string()).into());
        }

        let line = CartItem::from_snapshot(LineId::Remote(Uuid::new_v4()), product, quantity);
        contents.cart.push(line.clone());
        Ok(line)
    }

    async fn update_line(&self, id: LineId, quantity: u32) -> Result<(), StoreError> {
        let mut contents = self.writable()?;
        let line = contents
            .cart
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(StoreError::MissingLine(id))?;
        line.quantity = quantity;
        Ok(())
    }

    async fn delete_line(&self, id: LineId) -> Result<(), StoreError> {
        self.writable()?.cart.retain(|item| item.id != id);
        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), StoreError> {
        self.writable()?.cart.clear();
        Ok(())
    }

    async fn load_wishlist(&self) -> Result<Vec<WishlistItem>, StoreError> {
        Ok(self.available()?.wishlist.clone())
    }

    async fn insert_wishlist(&self, product: ProductSnapshot) -> Result<WishlistItem, StoreError> {
        let mut contents = self.writable()?;
        if contents
            .wishlist
            .iter()
            .any(|item| item.product_id == product.product_id)
        {
            return Err(
                RepositoryError::Conflict("wishlist entry already exists".to_string()).into(),
            );
        }

        let entry = WishlistItem::from_snapshot(LineId::Remote(Uuid::new_v4()), product);
        contents.wishlist.push(entry.clone());
        Ok(entry)
    }

    async fn delete_wishlist(&self, id: LineId) -> Result<(), StoreError> {
        self.writable()?.wishlist.retain(|item| item.id != id);
        Ok(())
    }
}

//! Guest-mode store over a string key/value backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{instrument, warn};

use la_red_core::LineId;

use super::{CartStore, StoreError, StoreKind};
use crate::models::session_keys::{GUEST_CART, GUEST_WISHLIST};
use crate::models::{CartItem, ProductSnapshot, WishlistItem};

/// Async string key/value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process [`KeyValueStore`]. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value without going through the async interface.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Overwrite a value without going through the async interface.
    pub fn put_raw(&self, key: &str, value: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.put_raw(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Guest cart and wishlist kept as two JSON arrays.
///
/// Every mutation reads the whole array, changes it and writes it back.
pub struct LocalStore<K> {
    kv: K,
}

impl<K: KeyValueStore> LocalStore<K> {
    #[must_use]
    pub const fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Read an array, treating a missing or unreadable value as empty.
    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable guest data");
                Ok(Vec::new())
            }
        }
    }

    async fn write<T: Serialize + Sync>(&self, key: &str, items: &[T]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(items)?;
        self.kv.set(key, raw).await
    }
}

#[async_trait]
impl<K: KeyValueStore> CartStore for LocalStore<K> {
    fn kind(&self) -> StoreKind {
        StoreKind::Guest
    }

    async fn load_cart(&self) -> Result<Vec<CartItem>, StoreError> {
        self.read(GUEST_CART).await
    }

    #[instrument(skip(self, product), fields(product_id = %product.product_id))]
    async fn insert_line(
        &self,
        product: ProductSnapshot,
        quantity: u32,
    ) -> Result<CartItem, StoreError> {
        let mut items: Vec<CartItem> = self.read(GUEST_CART).await?;
        let id = LineId::next_local(items.iter().map(|item| &item.id));
        let line = CartItem::from_snapshot(id, product, quantity);

        items.push(line.clone());
        self.write(GUEST_CART, &items).await?;
        Ok(line)
    }

    async fn update_line(&self, id: LineId, quantity: u32) -> Result<(), StoreError> {
        let mut items: Vec<CartItem> = self.read(GUEST_CART).await?;
        let line = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(StoreError::MissingLine(id))?;
        line.quantity = quantity;

        self.write(GUEST_CART, &items).await
    }

    async fn delete_line(&self, id: LineId) -> Result<(), StoreError> {
        let mut items: Vec<CartItem> = self.read(GUEST_CART).await?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(());
        }

        self.write(GUEST_CART, &items).await
    }

    async fn clear_cart(&self) -> Result<(), StoreError> {
        self.kv.remove(GUEST_CART).await
    }

    async fn load_wishlist(&self) -> Result<Vec<WishlistItem>, StoreError> {
        self.read(GUEST_WISHLIST).await
    }

    async fn insert_wishlist(&self, product: ProductSnapshot) -> Result<WishlistItem, StoreError> {
        let mut items: Vec<WishlistItem> = self.read(GUEST_WISHLIST).await?;
        let id = LineId::next_local(items.iter().map(|item| &item.id));
        let entry = WishlistItem::from_snapshot(id, product);

        items.push(entry.clone());
        self.write(GUEST_WISHLIST, &items).await?;
        Ok(entry)
    }

    async fn delete_wishlist(&self, id: LineId) -> Result<(), StoreError> {
        let mut items: Vec<WishlistItem> = self.read(GUEST_WISHLIST).await?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(());
        }

        self.write(GUEST_WISHLIST, &items).await
    }
}

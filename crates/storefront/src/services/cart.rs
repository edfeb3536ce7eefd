//! Cart and wishlist provider.
//!
//! [`CartProvider`] owns the in-memory cart and wishlist for one visitor
//! and a [`CartStore`] chosen when the session starts. Every mutation
//! calls the store first and changes memory only once the store has
//! confirmed, so a failed write leaves the provider matching storage.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use la_red_core::{ProductId, Tokens};

use crate::models::{CartItem, ProductSnapshot, WishlistItem};
use crate::storage::{CartStore, StoreError, StoreKind};

/// Cart and wishlist state for one visitor.
pub struct CartProvider {
    store: Box<dyn CartStore>,
    items: Vec<CartItem>,
    wishlist: Vec<WishlistItem>,
}

impl CartProvider {
    /// Create an empty provider over `store`. Call [`load`](Self::load)
    /// to populate it.
    #[must_use]
    pub fn new(store: Box<dyn CartStore>) -> Self {
        Self {
            store,
            items: Vec::new(),
            wishlist: Vec::new(),
        }
    }

    /// Create a provider and populate both collections.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if either collection cannot be read.
    pub async fn open(store: Box<dyn CartStore>) -> Result<Self, StoreError> {
        let mut provider = Self::new(store);
        provider.load().await?;
        Ok(provider)
    }

    /// Replace in-memory state with the store's contents.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if either collection cannot be read. State is
    /// left unchanged in that case.
    #[instrument(skip(self), fields(store = ?self.store.kind()))]
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let (items, wishlist) = tokio::try_join!(self.store.load_cart(), self.store.load_wishlist())
            .inspect_err(|e| warn!(error = %e, "Failed to load cart"))?;

        self.items = items;
        self.wishlist = wishlist;
        Ok(())
    }

    #[must_use]
    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn wishlist(&self) -> &[WishlistItem] {
        &self.wishlist
    }

    fn line(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Add one unit of a product.
    ///
    /// A product already in the cart has its quantity incremented;
    /// otherwise a new line with quantity 1 is inserted. If another
    /// request inserted the same line first, the cart is reloaded and that
    /// line is incremented instead.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the write.
    #[instrument(skip(self, product), fields(product_id = %product.product_id, store = ?self.store.kind()))]
    pub async fn add_to_cart(&mut self, product: ProductSnapshot) -> Result<(), StoreError> {
        let product_id = product.product_id;
        if self.line(product_id).is_some() {
            return self.increment(product_id).await;
        }

        match self.store.insert_line(product, 1).await {
            Ok(line) => {
                self.items.push(line);
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                debug!("Cart line added concurrently, reloading");
                self.items = self
                    .store
                    .load_cart()
                    .await
                    .inspect_err(|e| warn!(error = %e, "Failed to reload cart"))?;
                if self.line(product_id).is_none() {
                    return Err(e);
                }
                self.increment(product_id).await
            }
            Err(e) => {
                warn!(error = %e, "Failed to add cart line");
                Err(e)
            }
        }
    }

    async fn increment(&mut self, product_id: ProductId) -> Result<(), StoreError> {
        let quantity = self
            .line(product_id)
            .map_or(1, |line| i64::from(line.quantity) + 1);
        self.update_quantity(product_id, quantity).await
    }

    /// Remove a product's line. Absent products are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the delete.
    #[instrument(skip(self), fields(store = ?self.store.kind()))]
    pub async fn remove_from_cart(&mut self, product_id: ProductId) -> Result<(), StoreError> {
        let Some(id) = self.line(product_id).map(|line| line.id) else {
            return Ok(());
        };

        self.store
            .delete_line(id)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to remove cart line"))?;
        self.items.retain(|item| item.id != id);
        Ok(())
    }

    /// Set a product's quantity.
    ///
    /// Zero or negative removes the line. Absent products are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the write.
    #[instrument(skip(self), fields(store = ?self.store.kind()))]
    pub async fn update_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        if quantity <= 0 {
            return self.remove_from_cart(product_id).await;
        }
        let Some(id) = self.line(product_id).map(|line| line.id) else {
            return Ok(());
        };
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        self.store
            .update_line(id, quantity)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to update cart line"))?;
        if let Some(line) = self.items.iter_mut().find(|item| item.id == id) {
            line.quantity = quantity;
        }
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the delete.
    #[instrument(skip(self), fields(store = ?self.store.kind()))]
    pub async fn clear_cart(&mut self) -> Result<(), StoreError> {
        self.store
            .clear_cart()
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to clear cart"))?;
        self.items.clear();
        Ok(())
    }

    /// Sum of `price_tokens * quantity` over every line.
    #[must_use]
    pub fn cart_total(&self) -> Tokens {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Sum of quantities over every line.
    #[must_use]
    pub fn cart_items_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Add a product to the wishlist. Already-present products are ignored,
    /// including ones another request stored since this provider loaded.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the write.
    #[instrument(skip(self, product), fields(product_id = %product.product_id, store = ?self.store.kind()))]
    pub async fn add_to_wishlist(&mut self, product: ProductSnapshot) -> Result<(), StoreError> {
        if self.is_in_wishlist(product.product_id) {
            return Ok(());
        }

        match self.store.insert_wishlist(product).await {
            Ok(entry) => {
                self.wishlist.push(entry);
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                debug!("Wishlist entry added concurrently, reloading");
                self.wishlist = self
                    .store
                    .load_wishlist()
                    .await
                    .inspect_err(|e| warn!(error = %e, "Failed to reload wishlist"))?;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to add wishlist entry");
                Err(e)
            }
        }
    }

    /// Remove a product from the wishlist. Absent products are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the delete.
    #[instrument(skip(self), fields(store = ?self.store.kind()))]
    pub async fn remove_from_wishlist(&mut self, product_id: ProductId) -> Result<(), StoreError> {
        let Some(id) = self
            .wishlist
            .iter()
            .find(|entry| entry.product_id == product_id)
            .map(|entry| entry.id)
        else {
            return Ok(());
        };

        self.store
            .delete_wishlist(id)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to remove wishlist entry"))?;
        self.wishlist.retain(|entry| entry.id != id);
        Ok(())
    }

    #[must_use]
    pub fn is_in_wishlist(&self, product_id: ProductId) -> bool {
        self.wishlist
            .iter()
            .any(|entry| entry.product_id == product_id)
    }
}

/// Outcome of [`migrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Lines inserted into the destination.
    pub lines_added: usize,
    /// Existing destination lines whose quantity grew.
    pub lines_merged: usize,
    /// Wishlist entries inserted into the destination.
    pub wishlist_added: usize,
}

/// Move a cart and wishlist from one store into another.
///
/// Quantities of products already in `to` are added together; wishlist
/// entries already in `to` are skipped. Each source line and entry is
/// deleted from `from` as soon as `to` holds it.
///
/// # Errors
///
/// Returns `StoreError` from the first failing store call. Whatever was
/// moved before the failure is gone from `from`, so calling `migrate`
/// again moves only the rest.
#[instrument(skip_all, fields(from = ?from.kind(), to = ?to.kind()))]
pub async fn migrate(from: &dyn CartStore, to: &dyn CartStore) -> Result<MigrationReport, StoreError> {
    let mut report = MigrationReport::default();

    let (source_cart, target_cart) = tokio::try_join!(from.load_cart(), to.load_cart())?;
    for line in source_cart {
        match target_cart
            .iter()
            .find(|existing| existing.product_id == line.product_id)
        {
            Some(existing) => {
                let quantity = existing.quantity.saturating_add(line.quantity);
                to.update_line(existing.id, quantity).await?;
                report.lines_merged += 1;
            }
            None => {
                to.insert_line(line.snapshot(), line.quantity).await?;
                report.lines_added += 1;
            }
        }
        from.delete_line(line.id).await?;
    }

    let (source_wishlist, target_wishlist) =
        tokio::try_join!(from.load_wishlist(), to.load_wishlist())?;
    for entry in source_wishlist {
        if !target_wishlist
            .iter()
            .any(|existing| existing.product_id == entry.product_id)
        {
            to.insert_wishlist(entry.snapshot()).await?;
            report.wishlist_added += 1;
        }
        from.delete_wishlist(entry.id).await?;
    }

    info!(
        lines_added = report.lines_added,
        lines_merged = report.lines_merged,
        wishlist_added = report.wishlist_added,
        "Migrated cart"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use la_red_core::LineId;

    use super::*;
    use crate::storage::{LocalStore, MemoryCartStore, MemoryKeyValueStore};

    fn product(id: i32, price: i64) -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::new(id),
            name: format!("Producto {id}"),
            price_tokens: Tokens::new(price),
            image: None,
            category: "merch".to_string(),
        }
    }

    fn guest() -> CartProvider {
        CartProvider::new(Box::new(LocalStore::new(MemoryKeyValueStore::new())))
    }

    fn member() -> CartProvider {
        CartProvider::new(Box::new(MemoryCartStore::new()))
    }

    fn both() -> [CartProvider; 2] {
        [guest(), member()]
    }

    #[tokio::test]
    async fn test_repeated_adds_make_one_line() {
        for mut cart in both() {
            for _ in 0..5 {
                cart.add_to_cart(product(1, 10)).await.unwrap();
            }
            assert_eq!(cart.items().len(), 1);
            assert_eq!(cart.items()[0].quantity, 5);

            cart.load().await.unwrap();
            assert_eq!(cart.items()[0].quantity, 5, "{:?}", cart.store_kind());
        }
    }

    #[tokio::test]
    async fn test_non_positive_quantity_removes_line() {
        for mut cart in both() {
            cart.add_to_cart(product(1, 10)).await.unwrap();
            cart.add_to_cart(product(2, 10)).await.unwrap();

            cart.update_quantity(ProductId::new(1), 0).await.unwrap();
            cart.update_quantity(ProductId::new(2), -3).await.unwrap();
            assert!(cart.items().is_empty());

            cart.load().await.unwrap();
            assert!(cart.items().is_empty());
        }
    }

    #[tokio::test]
    async fn test_total_and_count() {
        for mut cart in both() {
            cart.add_to_cart(product(1, 100)).await.unwrap();
            cart.add_to_cart(product(2, 250)).await.unwrap();
            cart.update_quantity(ProductId::new(2), 3).await.unwrap();

            assert_eq!(cart.cart_total(), Tokens::new(850));
            assert_eq!(cart.cart_items_count(), 4);
        }
    }

    #[tokio::test]
    async fn test_wishlist_add_is_idempotent() {
        for mut cart in both() {
            cart.add_to_wishlist(product(7, 10)).await.unwrap();
            cart.add_to_wishlist(product(7, 10)).await.unwrap();

            assert_eq!(cart.wishlist().len(), 1);
            assert!(cart.is_in_wishlist(ProductId::new(7)));

            cart.remove_from_wishlist(ProductId::new(7)).await.unwrap();
            assert!(!cart.is_in_wishlist(ProductId::new(7)));
            cart.remove_from_wishlist(ProductId::new(7)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_removing_absent_product_is_noop() {
        for mut cart in both() {
            cart.add_to_cart(product(1, 10)).await.unwrap();
            cart.remove_from_cart(ProductId::new(99)).await.unwrap();
            cart.update_quantity(ProductId::new(99), 4).await.unwrap();

            assert_eq!(cart.items().len(), 1);
            assert_eq!(cart.items()[0].product_id, ProductId::new(1));
        }
    }

    #[tokio::test]
    async fn test_guest_adds_same_product_twice() {
        let mut cart = guest();
        cart.add_to_cart(product(42, 100)).await.unwrap();
        cart.add_to_cart(product(42, 100)).await.unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].product_id, ProductId::new(42));
        assert_eq!(cart.items()[0].quantity, 2);
        assert!(matches!(cart.items()[0].id, LineId::Local(_)));
        assert_eq!(cart.cart_total(), Tokens::new(200));
        assert_eq!(cart.cart_items_count(), 2);
    }

    #[tokio::test]
    async fn test_guest_add_then_zero_quantity() {
        let mut cart = guest();
        cart.add_to_cart(product(42, 100)).await.unwrap();
        cart.update_quantity(ProductId::new(42), 0).await.unwrap();

        assert!(cart.items().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let store = MemoryCartStore::new();
        let mut cart = CartProvider::new(Box::new(store.clone()));
        cart.add_to_cart(product(1, 10)).await.unwrap();

        store.set_unavailable(true);
        assert!(cart.add_to_cart(product(1, 10)).await.is_err());
        assert!(cart.add_to_cart(product(2, 10)).await.is_err());
        assert!(cart.clear_cart().await.is_err());

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_store_kind() {
        assert_eq!(guest().store_kind(), StoreKind::Guest);
        assert_eq!(member().store_kind(), StoreKind::Member);
    }

    #[tokio::test]
    async fn test_migrate_merges_and_clears_source() {
        let from = LocalStore::new(MemoryKeyValueStore::new());
        let to = MemoryCartStore::new();

        from.insert_line(product(1, 10), 2).await.unwrap();
        from.insert_line(product(2, 20), 1).await.unwrap();
        from.insert_wishlist(product(3, 30)).await.unwrap();
        from.insert_wishlist(product(4, 40)).await.unwrap();
        to.insert_line(product(1, 10), 3).await.unwrap();
        to.insert_wishlist(product(4, 40)).await.unwrap();

        let report = migrate(&from, &to).await.unwrap();
        assert_eq!(
            report,
            MigrationReport {
                lines_added: 1,
                lines_merged: 1,
                wishlist_added: 1,
            }
        );

        let member = CartProvider::open(Box::new(to)).await.unwrap();
        assert_eq!(member.cart_items_count(), 6);
        assert_eq!(member.cart_total(), Tokens::new(70));
        assert_eq!(member.wishlist().len(), 2);

        assert!(from.load_cart().await.unwrap().is_empty());
        assert!(from.load_wishlist().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_failure_keeps_source() {
        let from = LocalStore::new(MemoryKeyValueStore::new());
        let to = MemoryCartStore::new();
        from.insert_line(product(1, 10), 2).await.unwrap();
        to.set_unavailable(true);

        assert!(migrate(&from, &to).await.is_err());
        assert_eq!(from.load_cart().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_migrate_retry_after_partial_failure() {
        let from = LocalStore::new(MemoryKeyValueStore::new());
        let to = MemoryCartStore::new();
        from.insert_line(product(1, 10), 2).await.unwrap();
        from.insert_wishlist(product(3, 30)).await.unwrap();
        to.insert_line(product(1, 10), 3).await.unwrap();

        // The quantity merge lands, the wishlist insert does not.
        to.fail_write_after(1);
        assert!(migrate(&from, &to).await.is_err());
        assert!(from.load_cart().await.unwrap().is_empty());
        assert_eq!(from.load_wishlist().await.unwrap().len(), 1);

        let report = migrate(&from, &to).await.unwrap();
        assert_eq!(report.lines_merged, 0);
        assert_eq!(report.wishlist_added, 1);

        let member = CartProvider::open(Box::new(to)).await.unwrap();
        assert_eq!(member.cart_items_count(), 5);
        assert!(member.is_in_wishlist(ProductId::new(3)));
        assert!(from.load_wishlist().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_wishlist_adds() {
        let store = MemoryCartStore::new();
        let mut first = CartProvider::open(Box::new(store.clone())).await.unwrap();
        let mut second = CartProvider::open(Box::new(store.clone())).await.unwrap();

        first.add_to_wishlist(product(7, 10)).await.unwrap();
        second.add_to_wishlist(product(7, 10)).await.unwrap();

        assert!(second.is_in_wishlist(ProductId::new(7)));
        assert_eq!(store.load_wishlist().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_cart_adds_increment() {
        let store = MemoryCartStore::new();
        let mut first = CartProvider::open(Box::new(store.clone())).await.unwrap();
        let mut second = CartProvider::open(Box::new(store.clone())).await.unwrap();

        first.add_to_cart(product(1, 10)).await.unwrap();
        second.add_to_cart(product(1, 10)).await.unwrap();

        assert_eq!(second.items().len(), 1);
        assert_eq!(second.items()[0].quantity, 2);
        let stored = store.load_cart().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].quantity, 2);
    }
}

//! Cart provider behavior across store kinds, without HTTP.

#![allow(clippy::unwrap_used)]

use la_red_core::{ProductId, Tokens};
use la_red_storefront::models::ProductSnapshot;
use la_red_storefront::services::{CartProvider, migrate};
use la_red_storefront::storage::{
    CartStore, LocalStore, MemoryCartStore, MemoryKeyValueStore, StoreKind,
};

fn hoodie() -> ProductSnapshot {
    ProductSnapshot {
        product_id: ProductId::new(1),
        name: "Hoodie Negra".to_string(),
        price_tokens: Tokens::new(450),
        image: Some("https://cdn.laredmafia.com/hoodie.png".to_string()),
        category: "ropa".to_string(),
    }
}

fn cap() -> ProductSnapshot {
    ProductSnapshot {
        product_id: ProductId::new(2),
        name: "Gorra Roja".to_string(),
        price_tokens: Tokens::new(120),
        image: None,
        category: "accesorios".to_string(),
    }
}

#[tokio::test]
async fn test_guest_cart_survives_a_new_provider() {
    let kv = MemoryKeyValueStore::new();

    let mut cart = CartProvider::open(Box::new(LocalStore::new(kv.clone())))
        .await
        .unwrap();
    cart.add_to_cart(hoodie()).await.unwrap();
    cart.add_to_cart(hoodie()).await.unwrap();
    cart.add_to_wishlist(cap()).await.unwrap();

    let reopened = CartProvider::open(Box::new(LocalStore::new(kv)))
        .await
        .unwrap();
    assert_eq!(reopened.store_kind(), StoreKind::Guest);
    assert_eq!(reopened.cart_items_count(), 2);
    assert_eq!(reopened.cart_total(), Tokens::new(900));
    assert!(reopened.is_in_wishlist(cap().product_id));
}

#[tokio::test]
async fn test_sign_in_then_merge_keeps_guest_items() {
    let kv = MemoryKeyValueStore::new();
    let member = MemoryCartStore::new();

    let mut guest = CartProvider::open(Box::new(LocalStore::new(kv.clone())))
        .await
        .unwrap();
    guest.add_to_cart(hoodie()).await.unwrap();
    guest.add_to_cart(cap()).await.unwrap();

    let mut existing = CartProvider::open(Box::new(member.clone())).await.unwrap();
    existing.add_to_cart(cap()).await.unwrap();
    existing.add_to_wishlist(hoodie()).await.unwrap();

    let report = migrate(&LocalStore::new(kv.clone()), &member).await.unwrap();
    assert_eq!(report.lines_added, 1);
    assert_eq!(report.lines_merged, 1);
    assert_eq!(report.wishlist_added, 0);

    let merged = CartProvider::open(Box::new(member)).await.unwrap();
    assert_eq!(merged.store_kind(), StoreKind::Member);
    assert_eq!(merged.cart_items_count(), 3);
    assert_eq!(merged.cart_total(), Tokens::new(450 + 2 * 120));

    let guest_after = LocalStore::new(kv);
    assert!(guest_after.load_cart().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unavailable_member_store_leaves_state_unchanged() {
    let member = MemoryCartStore::new();
    let mut cart = CartProvider::open(Box::new(member.clone())).await.unwrap();
    cart.add_to_cart(hoodie()).await.unwrap();

    member.set_unavailable(true);
    assert!(cart.add_to_cart(cap()).await.is_err());
    assert!(cart.update_quantity(hoodie().product_id, 5).await.is_err());
    assert!(cart.clear_cart().await.is_err());

    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.cart_items_count(), 1);

    member.set_unavailable(false);
    let reopened = CartProvider::open(Box::new(member)).await.unwrap();
    assert_eq!(reopened.items(), cart.items());
}

//! Cart and wishlist route handlers.
//!
//! Each request builds a provider over the visitor's store (session
//! arrays for guests, rows for members), applies one operation and
//! returns the resulting state.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use la_red_core::{ProductId, Tokens};

use super::cart_provider;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{CartItem, ProductSnapshot, WishlistItem};
use crate::services::{CartProvider, MigrationReport, migrate};
use crate::state::AppState;
use crate::storage::{RemoteStore, StoreKind, guest_store};

/// Cart contents with derived totals.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub store: StoreKind,
    pub items: Vec<CartItem>,
    pub total: Tokens,
    pub count: u64,
}

impl From<&CartProvider> for CartView {
    fn from(cart: &CartProvider) -> Self {
        Self {
            store: cart.store_kind(),
            items: cart.items().to_vec(),
            total: cart.cart_total(),
            count: cart.cart_items_count(),
        }
    }
}

/// Wishlist contents.
#[derive(Debug, Serialize)]
pub struct WishlistView {
    pub store: StoreKind,
    pub items: Vec<WishlistItem>,
}

impl From<&CartProvider> for WishlistView {
    fn from(cart: &CartProvider) -> Self {
        Self {
            store: cart.store_kind(),
            items: cart.wishlist().to_vec(),
        }
    }
}

/// Body for adding a product to the cart or wishlist.
#[derive(Debug, Deserialize)]
pub struct ProductRef {
    pub product_id: ProductId,
}

/// Body for setting a line's quantity.
#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: i64,
}

/// Result of merging the guest cart into the member cart.
#[derive(Debug, Serialize)]
pub struct MergeView {
    pub report: MigrationReport,
    pub cart: CartView,
}

/// Product fields to copy onto the line, from the catalog rather than
/// the client.
async fn snapshot(state: &AppState, product_id: ProductId) -> Result<ProductSnapshot> {
    state
        .catalog()
        .snapshot(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))
}

/// `GET /api/cart`
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let cart = cart_provider(&state, &session, user.as_ref()).await?;
    Ok(Json(CartView::from(&cart)))
}

/// `POST /api/cart/items`
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<ProductRef>,
) -> Result<Json<CartView>> {
    let product = snapshot(&state, body.product_id).await?;
    let mut cart = cart_provider(&state, &session, user.as_ref()).await?;
    cart.add_to_cart(product).await?;
    Ok(Json(CartView::from(&cart)))
}

/// `PATCH /api/cart/items/{product_id}`
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<QuantityUpdate>,
) -> Result<Json<CartView>> {
    let mut cart = cart_provider(&state, &session, user.as_ref()).await?;
    cart.update_quantity(product_id, body.quantity).await?;
    Ok(Json(CartView::from(&cart)))
}

/// `DELETE /api/cart/items/{product_id}`
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let mut cart = cart_provider(&state, &session, user.as_ref()).await?;
    cart.remove_from_cart(product_id).await?;
    Ok(Json(CartView::from(&cart)))
}

/// `DELETE /api/cart`
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let mut cart = cart_provider(&state, &session, user.as_ref()).await?;
    cart.clear_cart().await?;
    Ok(Json(CartView::from(&cart)))
}

/// `POST /api/cart/merge-guest`
///
/// Signing in never merges on its own; the client calls this when the
/// visitor chooses to keep what they added as a guest.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn merge_guest(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<MergeView>> {
    let guest = guest_store(&session);
    let member = RemoteStore::new(state.pool().clone(), user.id);
    let report = migrate(&guest, &member).await?;

    let cart = CartProvider::open(Box::new(member)).await?;
    Ok(Json(MergeView {
        report,
        cart: CartView::from(&cart),
    }))
}

/// `GET /api/wishlist`
pub async fn wishlist(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<WishlistView>> {
    let cart = cart_provider(&state, &session, user.as_ref()).await?;
    Ok(Json(WishlistView::from(&cart)))
}

/// `POST /api/wishlist`
#[instrument(skip(state, session, user))]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<ProductRef>,
) -> Result<Json<WishlistView>> {
    let product = snapshot(&state, body.product_id).await?;
    let mut cart = cart_provider(&state, &session, user.as_ref()).await?;
    cart.add_to_wishlist(product).await?;
    Ok(Json(WishlistView::from(&cart)))
}

/// `DELETE /api/wishlist/{product_id}`
#[instrument(skip(state, session, user))]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<WishlistView>> {
    let mut cart = cart_provider(&state, &session, user.as_ref()).await?;
    cart.remove_from_wishlist(product_id).await?;
    Ok(Json(WishlistView::from(&cart)))
}

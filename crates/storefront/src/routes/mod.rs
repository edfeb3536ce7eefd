//! HTTP route handlers for storefront.
//!
//! Everything is JSON under `/api`.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET    /api/products[?category=]         - Active products
//! GET    /api/products/{id}                - Product detail
//!
//! # Cart (guest session or member rows)
//! GET    /api/cart                         - Lines, total, count
//! POST   /api/cart/items                   - Add one unit
//! PATCH  /api/cart/items/{product_id}      - Set quantity (<= 0 removes)
//! DELETE /api/cart/items/{product_id}      - Remove line
//! DELETE /api/cart                         - Clear
//! POST   /api/cart/merge-guest             - Move guest cart into member cart
//!
//! # Wishlist
//! GET    /api/wishlist
//! POST   /api/wishlist
//! DELETE /api/wishlist/{product_id}
//!
//! # Auth (rate limited)
//! POST   /api/auth/register
//! POST   /api/auth/login
//! POST   /api/auth/logout
//!
//! # Account (requires auth, except GET /api/account)
//! GET    /api/account                      - Identity, profile, balance, settings
//! PATCH  /api/account/settings
//! POST   /api/account/avatar               - Multipart field "file"
//! GET    /api/account/addresses            POST /api/account/addresses
//! PUT    /api/account/addresses/{id}       DELETE /api/account/addresses/{id}
//! GET    /api/account/orders
//! POST   /api/checkout
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod products;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
};
use tower_sessions::Session;

use crate::db::PgAccountStore;
use crate::error::Result;
use crate::middleware::auth_rate_limiter;
use crate::models::{CurrentUser, UserSettings, session_keys};
use crate::services::{AccountProvider, CartProvider, SessionAuthClient};
use crate::state::AppState;
use crate::storage::store_for;

/// Slack for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the account provider for this visitor.
pub(crate) async fn account_provider(state: &AppState, session: &Session) -> Result<AccountProvider> {
    let auth = SessionAuthClient::new(
        session.clone(),
        state.pool().clone(),
        state.auth_events().clone(),
    );
    let saved = session
        .get::<UserSettings>(session_keys::USER_SETTINGS)
        .await?;

    Ok(AccountProvider::new(
        Arc::new(auth),
        Arc::new(PgAccountStore::new(state.pool().clone())),
    )
    .with_starting_tokens(state.config().starting_tokens)
    .with_saved_settings(saved))
}

/// Build and load the cart provider for this visitor.
pub(crate) async fn cart_provider(
    state: &AppState,
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<CartProvider> {
    Ok(CartProvider::open(store_for(state.pool(), session, user)).await?)
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
        .route("/merge-guest", post(cart::merge_guest))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::wishlist).post(cart::add_to_wishlist))
        .route("/{product_id}", delete(cart::remove_from_wishlist))
}

/// Create the account routes router.
pub fn account_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(account::show))
        .route("/settings", patch(account::update_settings))
        .route(
            "/avatar",
            post(account::upload_avatar)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD)),
        )
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            put(account::update_address).delete(account::delete_address),
        )
        .route("/orders", get(account::orders))
}

/// Create all `/api` routes.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    let api = Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes(max_upload_bytes))
        .route("/checkout", post(account::checkout));

    Router::new().nest("/api", api)
}

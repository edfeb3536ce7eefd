//! Business logic services for storefront.
//!
//! # Services
//!
//! - `account` - Session/profile provider (identity, profile, balance, settings)
//! - `auth` - Password authentication and auth events
//! - `cart` - Cart/wishlist provider and guest-to-member migration
//! - `catalog` - Cached product reads
//! - `checkout` - Token-paid orders
//! - `media` - Avatar uploads

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod media;

pub use account::{AccountError, AccountProvider, AccountStore};
pub use auth::{AuthClient, AuthError, AuthEvent, SessionAuthClient};
pub use cart::{CartProvider, MigrationReport, migrate};
pub use catalog::CatalogService;
pub use checkout::{CheckoutError, CheckoutService};
pub use media::{MediaError, MediaStorage};

//! Domain models for the storefront.

pub mod account;
pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use account::{AccountSnapshot, Profile, SettingsUpdate, TokenBalance, UserSettings};
pub use address::{Address, AddressInput};
pub use cart::{CartItem, ProductSnapshot, WishlistItem};
pub use order::{Order, OrderItem};
pub use product::Product;
pub use session::keys as session_keys;
pub use user::{CurrentUser, User};

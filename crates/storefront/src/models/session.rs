//! Session keys.
//!
//! The visitor's session doubles as the guest-mode key/value store, so
//! the cart and wishlist arrays live next to the identity entry.

/// Keys stored in the tower session.
pub mod keys {
    /// The signed-in user (`CurrentUser`).
    pub const CURRENT_USER: &str = "current_user";

    /// JSON array of guest `CartItem`s.
    pub const GUEST_CART: &str = "guest_cart";

    /// JSON array of guest `WishlistItem`s.
    pub const GUEST_WISHLIST: &str = "guest_wishlist";

    /// Settings saved on this device (`UserSettings`).
    pub const USER_SETTINGS: &str = "user_settings";
}

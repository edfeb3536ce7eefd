//! Cart and wishlist entries.
//!
//! The same shapes are stored as JSON arrays in guest sessions and built
//! from joined rows in member mode, so the serde layout is the guest
//! storage format.

use serde::{Deserialize, Serialize};

use la_red_core::{LineId, ProductId, Tokens};

/// Product fields copied onto a cart line or wishlist entry when it is
/// added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price_tokens: Tokens,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: String,
}

/// A cart line. At most one line exists per `product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: LineId,
    pub product_id: ProductId,
    pub name: String,
    pub price_tokens: Tokens,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: String,
}

impl CartItem {
    /// Build a line from a product snapshot.
    #[must_use]
    pub fn from_snapshot(id: LineId, product: ProductSnapshot, quantity: u32) -> Self {
        Self {
            id,
            product_id: product.product_id,
            name: product.name,
            price_tokens: product.price_tokens,
            quantity,
            image: product.image,
            category: product.category,
        }
    }

    /// `price_tokens * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Tokens {
        self.price_tokens.times(self.quantity)
    }

    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.product_id,
            name: self.name.clone(),
            price_tokens: self.price_tokens,
            image: self.image.clone(),
            category: self.category.clone(),
        }
    }
}

/// A wishlist entry. Presence only, no quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: LineId,
    pub product_id: ProductId,
    pub name: String,
    pub price_tokens: Tokens,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: String,
}

impl WishlistItem {
    #[must_use]
    pub fn from_snapshot(id: LineId, product: ProductSnapshot) -> Self {
        Self {
            id,
            product_id: product.product_id,
            name: product.name,
            price_tokens: product.price_tokens,
            image: product.image,
            category: product.category,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.product_id,
            name: self.name.clone(),
            price_tokens: self.price_tokens,
            image: self.image.clone(),
            category: self.category.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_json_without_optional_fields() {
        // Entries written before image/category existed still parse.
        let json = r#"[{"id":1700000000000,"product_id":42,"name":"Gorra","price_tokens":100,"quantity":2}]"#;
        let items: Vec<CartItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, LineId::Local(1_700_000_000_000));
        assert_eq!(items[0].line_total(), Tokens::new(200));
        assert_eq!(items[0].image, None);
    }

    #[test]
    fn test_snapshot_preserves_product_fields() {
        let product = ProductSnapshot {
            product_id: ProductId::new(7),
            name: "Vinilo".to_string(),
            price_tokens: Tokens::new(350),
            image: Some("/media/vinilo.png".to_string()),
            category: "music".to_string(),
        };
        let line = CartItem::from_snapshot(LineId::Local(1), product.clone(), 3);
        assert_eq!(line.snapshot(), product);

        let entry = WishlistItem::from_snapshot(LineId::Local(2), product.clone());
        assert_eq!(entry.snapshot(), product);
    }
}

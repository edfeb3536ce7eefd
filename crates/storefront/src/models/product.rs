//! Catalog product.

use serde::{Deserialize, Serialize};

use la_red_core::{ProductId, Tokens};

use super::cart::ProductSnapshot;

/// A row of `storefront.products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price_tokens: Tokens,
    pub image: Option<String>,
    pub category: String,
    pub active: bool,
}

impl Product {
    /// The fields a cart line or wishlist entry copies from the product.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id,
            name: self.name.clone(),
            price_tokens: self.price_tokens,
            image: self.image.clone(),
            category: self.category.clone(),
        }
    }
}

//! Token-paid orders.

use chrono::{DateTime, Utc};
use serde::Serialize;

use la_red_core::{AddressId, OrderId, OrderStatus, ProductId, Tokens, UserId};

/// An order with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_tokens: Tokens,
    pub address_id: Option<AddressId>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// Name and price are copied at checkout so later catalog edits do not
/// rewrite order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price_tokens: Tokens,
    pub quantity: u32,
}

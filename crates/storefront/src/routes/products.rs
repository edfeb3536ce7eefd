//! Catalog route handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use la_red_core::ProductId;

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// Listing filters.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
}

/// `GET /api/products`
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Arc<Vec<Product>>>> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    Ok(Json(state.catalog().list(category).await?))
}

/// `GET /api/products/{id}`
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .catalog()
        .get(id)
        .await?
        .filter(|product| product.active)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

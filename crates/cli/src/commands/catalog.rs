//! Catalog import.
//!
//! The file is a YAML list of products:
//!
//! ```yaml
//! - name: Hoodie Negra
//!   price_tokens: 450
//!   category: ropa
//!   image: https://cdn.laredmafia.com/hoodie.png
//! - id: 7
//!   name: Gorra Roja
//!   price_tokens: 120
//!   category: accesorios
//!   active: false
//! ```
//!
//! Entries with an `id` replace that product; the rest are inserted.

use std::path::Path;

use la_red_storefront::db::ProductRepository;
use la_red_storefront::db::products::ProductUpsert;

use super::{CommandError, connect};

/// Parse a catalog file.
fn parse(content: &str) -> Result<Vec<ProductUpsert>, CommandError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Insert or update every product in the file.
///
/// The file is parsed before connecting, so a malformed file changes
/// nothing.
///
/// # Errors
///
/// Returns `CommandError` if the file cannot be read or parsed, or an
/// upsert fails.
pub async fn import(path: &Path) -> Result<(), CommandError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let products = parse(&content)?;
    tracing::info!(count = products.len(), "Parsed catalog");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);
    for product in &products {
        let saved = repo.upsert(product).await?;
        tracing::info!(id = %saved.id, name = %saved.name, "Upserted product");
    }

    tracing::info!("Catalog import complete");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let products = parse(
            "- name: Hoodie Negra\n  price_tokens: 450\n  category: ropa\n\
             - id: 7\n  name: Gorra Roja\n  price_tokens: 120\n  category: accesorios\n  active: false\n",
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert!(products[0].id.is_none());
        assert!(products[0].active);
        assert_eq!(products[0].price_tokens.amount(), 450);
        assert_eq!(products[1].id.map(|id| id.as_i32()), Some(7));
        assert!(!products[1].active);
    }

    #[test]
    fn test_parse_rejects_missing_price() {
        assert!(parse("- name: Sin Precio\n  category: ropa\n").is_err());
    }
}

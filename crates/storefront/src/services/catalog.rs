//! Catalog reads with an in-memory cache.
//!
//! Products and category listings are cached for 5 minutes. Catalog
//! imports run in another process and reach a running server when the
//! entries expire.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use la_red_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::models::{Product, ProductSnapshot};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Product(ProductId),
    Listing { category: Option<String> },
}

#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Listing(Arc<Vec<Product>>),
}

/// Cached access to `products`.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    pool: PgPool,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CatalogInner { pool, cache }),
        }
    }

    /// Active products, optionally in one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, category: Option<&str>) -> Result<Arc<Vec<Product>>, RepositoryError> {
        let key = CacheKey::Listing {
            category: category.map(str::to_owned),
        };
        if let Some(CacheValue::Listing(products)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for listing");
            return Ok(products);
        }

        let products = Arc::new(
            ProductRepository::new(&self.inner.pool)
                .list_active(category)
                .await?,
        );
        self.inner
            .cache
            .insert(key, CacheValue::Listing(Arc::clone(&products)))
            .await;

        Ok(products)
    }

    /// A product by id, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let product = ProductRepository::new(&self.inner.pool).get(id).await?;
        if let Some(product) = &product {
            self.inner
                .cache
                .insert(key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }

        Ok(product)
    }

    /// Snapshot of an active product, for adding to a cart or wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn snapshot(&self, id: ProductId) -> Result<Option<ProductSnapshot>, RepositoryError> {
        Ok(self
            .get(id)
            .await?
            .filter(|product| product.active)
            .map(|product| product.snapshot()))
    }
}

//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::broadcast;

use crate::config::StorefrontConfig;
use crate::services::{AuthEvent, CatalogService, MediaStorage};

/// Buffered auth events per subscriber before it starts lagging.
const AUTH_EVENT_CAPACITY: usize = 256;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: CatalogService,
    media: MediaStorage,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let catalog = CatalogService::new(pool.clone());
        let media = MediaStorage::new(&config.media);
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                media,
                auth_events,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn media(&self) -> &MediaStorage {
        &self.inner.media
    }

    /// Sender half of the auth event channel.
    #[must_use]
    pub fn auth_events(&self) -> &broadcast::Sender<AuthEvent> {
        &self.inner.auth_events
    }
}

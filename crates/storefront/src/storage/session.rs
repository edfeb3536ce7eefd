use async_trait::async_trait;
use tower_sessions::Session;

use super::{KeyValueStore, StoreError};

/// [`KeyValueStore`] over the visitor's session record.
#[derive(Clone)]
pub struct SessionKeyValueStore {
    session: Session,
}

impl SessionKeyValueStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl KeyValueStore for SessionKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.session.get::<String>(key).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.session.insert(key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.session.remove::<String>(key).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_session() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let kv = SessionKeyValueStore::new(session);

        assert_eq!(kv.get("guest_cart").await.unwrap(), None);
        kv.set("guest_cart", "[]".to_string()).await.unwrap();
        assert_eq!(kv.get("guest_cart").await.unwrap().as_deref(), Some("[]"));
        kv.remove("guest_cart").await.unwrap();
        assert_eq!(kv.get("guest_cart").await.unwrap(), None);
    }
}

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::HashStore;
use crate::errors::ServiceError;

type Hashes = HashMap<String, HashMap<String, String>>;

/// In-process [`HashStore`] holding every hash behind one `RwLock`.
///
/// Each operation takes the lock once, so `hincr_by` is atomic with respect
/// to concurrent callers just like its Redis counterpart.
#[derive(Clone, Default)]
pub struct MemoryHashStore {
    inner: Arc<RwLock<Hashes>>,
}

impl MemoryHashStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl HashStore for MemoryHashStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, ServiceError> {
        let map = self.inner.read().await;
        Ok(map.keys().cloned().collect())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, ServiceError> {
        let map = self.inner.read().await;
        Ok(map.get(key).cloned().unwrap_or_default())
    }

    async fn hset_if_absent(&self, key: &str, fields: &[(&str, String)]) -> Result<bool, ServiceError> {
        let mut map = self.inner.write().await;
        if map.contains_key(key) {
            return Ok(false);
        }
        let hash = map.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(true)
    }

    async fn hset_if_exists(&self, key: &str, fields: &[(&str, String)]) -> Result<bool, ServiceError> {
        let mut map = self.inner.write().await;
        let Some(hash) = map.get_mut(key) else {
            return Ok(false);
        };
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(true)
    }

    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, ServiceError> {
        let mut map = self.inner.write().await;
        let hash = map.entry(key.to_string()).or_default();
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value.to_string());
        Ok(true)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, ServiceError> {
        let mut map = self.inner.write().await;
        let hash = map.entry(key.to_string()).or_default();
        let current = match hash.get(field) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| ServiceError::Storage("hash value is not an integer".into()))?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| ServiceError::Storage("increment would overflow".into()))?;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn del(&self, key: &str) -> Result<bool, ServiceError> {
        let mut map = self.inner.write().await;
        Ok(map.remove(key).is_some())
    }
}

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info};

use super::HashStore;
use crate::errors::ServiceError;

/// Redis-backed [`HashStore`].
///
/// Cloning is cheap: every clone shares the same `ConnectionManager`, which
/// reconnects on its own after transient connection loss.
#[derive(Clone)]
pub struct RedisHashStore {
    conn_manager: ConnectionManager,
    write_if_absent: Arc<Script>,
    write_if_exists: Arc<Script>,
}

// KEYS[1] = hash key, ARGV = field, value, field, value, ...
const WRITE_IF_ABSENT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then return 0 end
redis.call('HSET', KEYS[1], unpack(ARGV))
return 1
";

const WRITE_IF_EXISTS: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then return 0 end
redis.call('HSET', KEYS[1], unpack(ARGV))
return 1
";

impl RedisHashStore {
    /// Open a client for `redis_url` and verify the server answers `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Storage`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, ServiceError> {
        let client = Client::open(redis_url)
            .map_err(|e| ServiceError::Storage(format!("invalid redis url: {e}")))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| ServiceError::Storage(format!("could not connect to redis: {e}")))?;
        let store = Self {
            conn_manager,
            write_if_absent: Arc::new(Script::new(WRITE_IF_ABSENT)),
            write_if_exists: Arc::new(Script::new(WRITE_IF_EXISTS)),
        };
        store.ping().await?;
        info!(event = "redis_connected", "connected to redis");
        Ok(store)
    }

    async fn conditional_hset(&self, script: &Script, key: &str, fields: &[(&str, String)]) -> Result<bool, ServiceError> {
        let mut conn = self.conn_manager.clone();
        let mut invocation = script.key(key);
        for (field, value) in fields {
            invocation.arg(*field).arg(value);
        }
        let written: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(written == 1)
    }
}

#[async_trait]
impl HashStore for RedisHashStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        let mut conn = self.conn_manager.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, ServiceError> {
        let mut conn = self.conn_manager.clone();
        let keys: Vec<String> = conn.keys("*").await?;
        debug!(count = keys.len(), "redis keys");
        Ok(keys)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, ServiceError> {
        let mut conn = self.conn_manager.clone();
        Ok(conn.hgetall(key).await?)
    }

    async fn hset_if_absent(&self, key: &str, fields: &[(&str, String)]) -> Result<bool, ServiceError> {
        self.conditional_hset(&self.write_if_absent, key, fields).await
    }

    async fn hset_if_exists(&self, key: &str, fields: &[(&str, String)]) -> Result<bool, ServiceError> {
        self.conditional_hset(&self.write_if_exists, key, fields).await
    }

    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, ServiceError> {
        let mut conn = self.conn_manager.clone();
        Ok(conn.hset_nx(key, field, value).await?)
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, ServiceError> {
        let mut conn = self.conn_manager.clone();
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn del(&self, key: &str) -> Result<bool, ServiceError> {
        let mut conn = self.conn_manager.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}

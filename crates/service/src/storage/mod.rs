//! Storage abstractions for the service layer
//!
//! The account store only needs a small slice of a hash-oriented key-value
//! store. `HashStore` names that slice so the Redis backend can be swapped
//! for the in-memory one in tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::ServiceError;

pub mod memory_store;
pub mod redis_store;

pub use memory_store::MemoryHashStore;
pub use redis_store::RedisHashStore;

#[async_trait]
pub trait HashStore: Send + Sync {
    /// Round-trip to the backend; fails when it is unreachable.
    async fn ping(&self) -> Result<(), ServiceError>;

    /// Every top-level key, in no particular order.
    async fn keys(&self) -> Result<Vec<String>, ServiceError>;

    /// All fields of the hash at `key`; empty when the key is absent.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, ServiceError>;

    /// Write the fields only if `key` does not exist yet, as one atomic step;
    /// returns whether anything was written.
    async fn hset_if_absent(&self, key: &str, fields: &[(&str, String)]) -> Result<bool, ServiceError>;

    /// Write the fields only if `key` already exists, as one atomic step;
    /// returns whether anything was written.
    async fn hset_if_exists(&self, key: &str, fields: &[(&str, String)]) -> Result<bool, ServiceError>;

    /// Set a field only if it does not exist yet; returns whether it was written.
    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, ServiceError>;

    /// Atomically add `delta` to an integer field and return the new value.
    /// A missing field counts as zero.
    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, ServiceError>;

    /// Remove a key; returns whether it existed.
    async fn del(&self, key: &str) -> Result<bool, ServiceError>;
}

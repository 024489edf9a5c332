//! # Store Module
//!
//! The key-value store contract the cache facade delegates to, with a Redis
//! backend and an in-process backend.
//!
//! Implementations are cheap handles: cloning one shares the underlying
//! connection or keyspace, so the caller keeps ownership of the store's
//! lifecycle while the facade holds a clone.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Operations the cache facade requires from a key-value store.
///
/// Keys passed here are already namespaced; values are already encoded.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get the text stored at `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set `key` to `value`, replacing any previous expiry
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Set every entry in one atomic pipelined batch, in order
    async fn set_pipelined(
        &self,
        entries: Vec<(String, String)>,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Get many keys in one call, aligned to the input order
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Delete `key`, returning how many keys were removed
    async fn del(&self, key: &str) -> Result<i64>;

    /// Count of the given key that exist (0 or 1)
    async fn exists(&self, key: &str) -> Result<i64>;

    /// Increment the integer at `key` by `delta`, creating it at `delta`
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Expire `key` after `ttl` at millisecond precision
    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remove every key in the current database
    async fn flushdb(&self) -> Result<()>;

    /// Remove every key in every database
    async fn flushall(&self) -> Result<()>;
}

/// Expiry in whole milliseconds, rounded up and never below 1 ms.
///
/// Redis rejects a 0 ms PSETEX and deletes the key on a 0 ms PEXPIRE, so
/// zero and sub-millisecond TTLs become the shortest expiry it accepts.
/// Every store applies this same rounding.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    let millis = ttl.as_nanos().div_ceil(1_000_000).max(1);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

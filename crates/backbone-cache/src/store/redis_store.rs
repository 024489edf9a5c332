//! # Redis Store
//!
//! `Store` implementation over a multiplexed Redis connection.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

use super::{ttl_millis, Store};
use crate::error::Result;

/// Redis-backed store. Clones share the same managed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Open a managed connection to the Redis server at `url`
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::info!(url = %url, "Connecting to Redis");
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Wrap a connection the caller already established
    pub const fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Get raw connection for advanced operations
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.pset_ex(key, value, ttl_millis(ttl)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn set_pipelined(
        &self,
        entries: Vec<(String, String)>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            match ttl {
                Some(ttl) => pipe.pset_ex(key, value, ttl_millis(ttl)).ignore(),
                None => pipe.set(key, value).ignore(),
            };
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        // Explicit MGET: the typed helper sends GET for a single key, which
        // does not decode into an aligned list when the key is missing.
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn del(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.exists(key).await?;
        Ok(count)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let ms = i64::try_from(ttl_millis(ttl)).unwrap_or(i64::MAX);
        let applied: bool = conn.pexpire(key, ms).await?;
        Ok(applied)
    }

    async fn flushdb(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn flushall(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHALL").query_async(&mut conn).await?;
        Ok(())
    }
}

//! # In-Memory Store
//!
//! Process-local `Store` with numbered logical databases and lazy
//! millisecond expiry, mirroring the Redis semantics the cache relies on.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{ttl_millis, Store};
use crate::error::{CacheError, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(deadline),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

type Keyspace = HashMap<String, Entry>;

/// Deadline for `ttl` at the millisecond precision Redis uses. `None` when
/// it is too far out to represent.
fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_millis(ttl_millis(ttl)))
}

/// Drop every expired entry from `keyspace`.
fn purge_expired(keyspace: &mut Keyspace) {
    let now = Instant::now();
    keyspace.retain(|_, entry| entry.is_live(now));
}

/// In-process store. Clones (and handles from [`MemoryStore::select`]) share
/// one set of databases.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    databases: Arc<Mutex<HashMap<usize, Keyspace>>>,
    db: usize,
}

impl MemoryStore {
    /// Create an empty store, using database 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to database `db`, sharing this store's data
    pub fn select(&self, db: usize) -> Self {
        Self {
            databases: Arc::clone(&self.databases),
            db,
        }
    }

    /// Database index this handle operates on
    pub const fn db(&self) -> usize {
        self.db
    }

    /// Expiry deadline of a live key, if one is set
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        self.with_keyspace(|keyspace| live(keyspace, key).and_then(|entry| entry.expires_at))
    }

    /// Number of live keys in this handle's database
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.with_keyspace(|keyspace| keyspace.values().filter(|e| e.is_live(now)).count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_keyspace<T>(&self, f: impl FnOnce(&mut Keyspace) -> T) -> T {
        let mut databases = self.databases.lock();
        f(databases.entry(self.db).or_default())
    }
}

/// Look up a key, dropping it first if it has expired.
fn live<'a>(keyspace: &'a mut Keyspace, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if keyspace.get(key).is_some_and(|entry| !entry.is_live(now)) {
        keyspace.remove(key);
    }
    keyspace.get_mut(key)
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.with_keyspace(|keyspace| live(keyspace, key).map(|entry| entry.value.clone())))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        self.with_keyspace(|keyspace| {
            purge_expired(keyspace);
            keyspace.insert(key.to_string(), Entry::new(value, ttl));
        });
        Ok(())
    }

    async fn set_pipelined(
        &self,
        entries: Vec<(String, String)>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        // Single lock acquisition makes the batch atomic to other handles.
        self.with_keyspace(|keyspace| {
            purge_expired(keyspace);
            for (key, value) in entries {
                keyspace.insert(key, Entry::new(value, ttl));
            }
        });
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        Ok(self.with_keyspace(|keyspace| {
            keys.iter()
                .map(|key| live(keyspace, key).map(|entry| entry.value.clone()))
                .collect()
        }))
    }

    async fn del(&self, key: &str) -> Result<i64> {
        Ok(self.with_keyspace(|keyspace| {
            i64::from(live(keyspace, key).is_some() && keyspace.remove(key).is_some())
        }))
    }

    async fn exists(&self, key: &str) -> Result<i64> {
        Ok(self.with_keyspace(|keyspace| i64::from(live(keyspace, key).is_some())))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.with_keyspace(|keyspace| match live(keyspace, key) {
            Some(entry) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    CacheError::Store("value is not an integer or out of range".to_string())
                })?;
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| CacheError::Store("increment or decrement would overflow".to_string()))?;
                // Existing expiry is kept, as with INCRBY.
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                purge_expired(keyspace);
                keyspace.insert(key.to_string(), Entry::new(delta.to_string(), None));
                Ok(delta)
            }
        })
    }

    async fn pexpire(&self, key: &str, ttl: Duration) -> Result<bool> {
        Ok(self.with_keyspace(|keyspace| match live(keyspace, key) {
            Some(entry) => {
                entry.expires_at = deadline(ttl);
                true
            }
            None => false,
        }))
    }

    async fn flushdb(&self) -> Result<()> {
        self.with_keyspace(Keyspace::clear);
        Ok(())
    }

    async fn flushall(&self) -> Result<()> {
        self.databases.lock().clear();
        Ok(())
    }
}

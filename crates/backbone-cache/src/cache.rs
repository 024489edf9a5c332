//! # Cache Facade
//!
//! Namespaced cache operations over any [`Store`], with values passed
//! through a [`Codec`].

use serde::{de::DeserializeOwned, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{Codec, JsonCodec};
use crate::error::{CacheError, Result};
use crate::store::Store;

/// Cache facade: prefixes every key, encodes values and delegates to the
/// store.
///
/// The facade is stateless beyond its three fixed fields. Failures from the
/// store and the codec are returned unchanged; there are no retries.
pub struct RedisCache<S, C> {
    store: S,
    prefix: String,
    codec: C,
}

/// Cache storing values as JSON
pub type JsonCache<S, V = serde_json::Value> = RedisCache<S, JsonCodec<V>>;

/// Shared cache handle
pub type SharedRedisCache<S, C> = Arc<RedisCache<S, C>>;

impl<S, V> RedisCache<S, JsonCodec<V>>
where
    S: Store,
    V: Serialize + DeserializeOwned,
{
    /// Create a JSON cache over `store` with every key prefixed by `prefix`
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self::with_codec(store, prefix, JsonCodec::new())
    }
}

impl<S, C> RedisCache<S, C>
where
    S: Store,
    C: Codec,
{
    /// Create a cache with an explicit codec
    pub fn with_codec(store: S, prefix: impl Into<String>, codec: C) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            codec,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// Namespaced store key for a logical key
    pub fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    // =========================================================================
    // SINGLE-KEY OPERATIONS
    // =========================================================================

    /// Get the value at `key`, or `default` if it is absent.
    pub async fn get(&self, key: &str, default: C::Value) -> Result<C::Value> {
        Ok(self.get_opt(key).await?.unwrap_or(default))
    }

    /// Get the value at `key`, `None` if it is absent.
    #[tracing::instrument(level = "debug", skip(self), fields(prefix = %self.prefix))]
    pub async fn get_opt(&self, key: &str) -> Result<Option<C::Value>> {
        let text = self.store.get(&self.key(key)).await?;
        text.map(|text| self.codec.decode(&text)).transpose()
    }

    /// Whether `key` is present.
    #[tracing::instrument(level = "debug", skip(self), fields(prefix = %self.prefix))]
    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.exists(&self.key(key)).await? != 0)
    }

    /// Store `value` at `key`. With `ttl` the key expires after that long,
    /// otherwise it never expires.
    #[tracing::instrument(level = "debug", skip(self, value), fields(prefix = %self.prefix))]
    pub async fn set(&self, key: &str, value: &C::Value, ttl: Option<Duration>) -> Result<()> {
        let text = self.codec.encode(value)?;
        self.store.set(&self.key(key), text, ttl).await
    }

    /// Delete `key`. Deleting a missing key is not an error.
    #[tracing::instrument(level = "debug", skip(self), fields(prefix = %self.prefix))]
    pub async fn forget(&self, key: &str) -> Result<()> {
        self.store.del(&self.key(key)).await?;
        Ok(())
    }

    // =========================================================================
    // BATCH OPERATIONS
    // =========================================================================

    /// Store every entry in one atomic pipelined round trip, all sharing
    /// `ttl`.
    ///
    /// Every value is encoded before anything is sent, so an encoding error
    /// writes nothing.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(prefix = %self.prefix, count = tracing::field::Empty, keys = tracing::field::Empty)
    )]
    pub async fn mset<I, K, B>(&self, entries: I, ttl: Option<Duration>) -> Result<()>
    where
        I: IntoIterator<Item = (K, B)>,
        K: AsRef<str>,
        B: Borrow<C::Value>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| {
                let text = self.codec.encode(value.borrow())?;
                Ok::<_, CacheError>((self.key(key.as_ref()), text))
            })
            .collect::<Result<Vec<_>>>()?;

        let span = tracing::Span::current();
        span.record("count", entries.len());
        span.record(
            "keys",
            tracing::field::debug(entries.iter().map(|(key, _)| key).collect::<Vec<_>>()),
        );

        if entries.is_empty() {
            return Ok(());
        }
        tracing::debug!("Pipelining cache writes");
        self.store.set_pipelined(entries, ttl).await
    }

    /// Get many keys in one round trip. The result has one element per key,
    /// in request order, with `default` wherever a key is absent.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(prefix = %self.prefix, count = tracing::field::Empty, keys = tracing::field::Empty)
    )]
    pub async fn mget<I>(&self, keys: I, default: C::Value) -> Result<Vec<C::Value>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        C::Value: Clone,
    {
        let keys: Vec<String> = keys.into_iter().map(|key| self.key(key.as_ref())).collect();
        let span = tracing::Span::current();
        span.record("count", keys.len());
        span.record("keys", tracing::field::debug(&keys));

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        self.store
            .mget(&keys)
            .await?
            .into_iter()
            .map(|text| match text {
                Some(text) => self.codec.decode(&text),
                None => Ok(default.clone()),
            })
            .collect()
    }

    // =========================================================================
    // COUNTERS
    // =========================================================================

    /// Increment the counter at `key` by `increment` and return the new
    /// value.
    ///
    /// When this call creates the counter (the new value equals
    /// `increment`) and `ttl` is given, the counter is set to expire after
    /// `ttl`. Later increments never refresh that expiry. Without `ttl` the
    /// counter does not expire.
    #[tracing::instrument(level = "debug", skip(self), fields(prefix = %self.prefix))]
    pub async fn cset(&self, key: &str, increment: i64, ttl: Option<Duration>) -> Result<i64> {
        let key = self.key(key);
        let value = self.store.incr_by(&key, increment).await?;

        if value == increment {
            if let Some(ttl) = ttl {
                self.store.pexpire(&key, ttl).await?;
            }
        }
        Ok(value)
    }

    /// Read the counter at `key`, 0 if absent. The stored text is parsed as
    /// an integer directly, bypassing the codec.
    #[tracing::instrument(level = "debug", skip(self), fields(prefix = %self.prefix))]
    pub async fn cget(&self, key: &str) -> Result<i64> {
        let key = self.key(key);
        match self.store.get(&key).await? {
            Some(text) => text
                .trim()
                .parse()
                .map_err(|_| CacheError::InvalidCounter { key, value: text }),
            None => Ok(0),
        }
    }

    // =========================================================================
    // FLUSH
    // =========================================================================

    /// Remove **every key in the store**, not only this cache's namespace.
    ///
    /// Issues FLUSHDB then FLUSHALL, so every cache sharing the store (any
    /// prefix, any database) is wiped.
    #[tracing::instrument(level = "debug", skip(self), fields(prefix = %self.prefix))]
    pub async fn flush(&self) -> Result<()> {
        tracing::warn!("Flushing entire cache store");
        self.store.flushdb().await?;
        self.store.flushall().await
    }
}

impl<S, C> fmt::Debug for RedisCache<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FnCodec;
    use crate::store::MemoryStore;
    use fake::{Fake, Faker};
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::collections::{BTreeMap, HashMap};

    fn cache(store: &MemoryStore) -> JsonCache<MemoryStore> {
        JsonCache::new(store.clone(), "app:")
    }

    #[tokio::test]
    async fn test_get_missing_returns_default() {
        let cache = cache(&MemoryStore::new());

        assert_eq!(cache.get("missing", Value::Null).await.unwrap(), Value::Null);
        assert_eq!(
            cache.get("missing", json!("sentinel")).await.unwrap(),
            json!("sentinel")
        );
        assert_eq!(cache.get_opt("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_stores_under_prefix_as_json() {
        let store = MemoryStore::new();
        let cache = cache(&store);

        cache.set("a", &json!({"x": 1}), None).await.unwrap();

        assert_eq!(
            store.get("app:a").await.unwrap().as_deref(),
            Some(r#"{"x":1}"#)
        );
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(cache.get("a", Value::Null).await.unwrap(), json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_round_trip_json_values() {
        let cache = cache(&MemoryStore::new());
        let values = [
            Value::Null,
            json!(true),
            json!(-17),
            json!(2.5),
            json!("text with \"quotes\""),
            json!([1, "two", null]),
            json!({"nested": {"list": [1, 2, 3], "flag": false}}),
        ];

        for (i, value) in values.iter().enumerate() {
            let key = format!("v{i}");
            cache.set(&key, value, None).await.unwrap();
            assert_eq!(&cache.get(&key, json!("absent")).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_round_trip_generated_strings() {
        let cache: JsonCache<MemoryStore, String> = JsonCache::new(MemoryStore::new(), "gen:");

        for _ in 0..16 {
            let key: String = Faker.fake();
            let value: String = Faker.fake();
            cache.set(&key, &value, None).await.unwrap();
            assert_eq!(cache.get(&key, String::new()).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_typed_values() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Session {
            user: String,
            visits: u32,
        }

        let cache: JsonCache<MemoryStore, Option<Session>> =
            JsonCache::new(MemoryStore::new(), "session:");
        let session = Session {
            user: "ada".to_string(),
            visits: 3,
        };

        cache.set("s1", &Some(session.clone()), None).await.unwrap();
        assert_eq!(cache.get("s1", None).await.unwrap(), Some(session));
        assert_eq!(cache.get("s2", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_with_ttl_expires() {
        let cache = cache(&MemoryStore::new());

        cache
            .set("short", &json!(1), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(cache.exists("short").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!cache.exists("short").await.unwrap());
    }

    #[tokio::test]
    async fn test_mset_then_mget_in_request_order() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let mut entries = HashMap::new();
        entries.insert("k1".to_string(), json!("v1"));
        entries.insert("k2".to_string(), json!({"v": 2}));

        cache.mset(&entries, None).await.unwrap();

        let values = cache.mget(["k1", "k2"], Value::Null).await.unwrap();
        assert_eq!(values, vec![json!("v1"), json!({"v": 2})]);
        let values = cache.mget(["k2", "k1"], Value::Null).await.unwrap();
        assert_eq!(values, vec![json!({"v": 2}), json!("v1")]);
        assert!(store.expires_at("app:k1").is_none());
    }

    #[tokio::test]
    async fn test_mset_shares_ttl() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let entries = BTreeMap::from([("a", json!(1)), ("b", json!(2))]);

        cache
            .mset(entries, Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert!(store.expires_at("app:a").is_some());
        assert!(store.expires_at("app:b").is_some());
    }

    #[tokio::test]
    async fn test_mset_empty_is_noop() {
        let store = MemoryStore::new();
        let cache = cache(&store);

        cache
            .mset(Vec::<(String, Value)>::new(), None)
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_mget_defaults_at_missing_positions() {
        let cache = cache(&MemoryStore::new());
        cache.set("present", &json!(1), None).await.unwrap();
        cache.set("also", &json!(3), None).await.unwrap();

        let values = cache
            .mget(["missing", "present", "gone", "also"], json!("dflt"))
            .await
            .unwrap();
        assert_eq!(values, vec![json!("dflt"), json!(1), json!("dflt"), json!(3)]);

        let empty: Vec<&str> = Vec::new();
        assert!(cache.mget(empty, Value::Null).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forget() {
        let cache = cache(&MemoryStore::new());
        cache.set("k", &json!("v"), None).await.unwrap();
        assert!(cache.exists("k").await.unwrap());

        cache.forget("k").await.unwrap();
        assert!(!cache.exists("k").await.unwrap());

        cache.forget("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn test_cset_arms_expiry_only_on_creation() {
        let store = MemoryStore::new();
        let cache = cache(&store);
        let ttl = Some(Duration::from_secs(60));

        assert_eq!(cache.cset("hits", 1, ttl).await.unwrap(), 1);
        let armed = store.expires_at("app:hits");
        assert!(armed.is_some());

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.cset("hits", 1, ttl).await.unwrap(), 2);
        assert_eq!(store.expires_at("app:hits"), armed);
        assert_eq!(cache.cget("hits").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cset_without_ttl_never_expires() {
        let store = MemoryStore::new();
        let cache = cache(&store);

        assert_eq!(cache.cset("n", 5, None).await.unwrap(), 5);
        assert!(store.expires_at("app:n").is_none());
        assert_eq!(cache.cset("n", 5, None).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_cset_counter_expires() {
        let cache = cache(&MemoryStore::new());

        cache
            .cset("burst", 1, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.cget("burst").await.unwrap(), 0);
        assert_eq!(cache.cset("burst", 1, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cget_missing_and_invalid() {
        let store = MemoryStore::new();
        let cache = cache(&store);

        assert_eq!(cache.cget("none").await.unwrap(), 0);

        cache.set("word", &json!("seven"), None).await.unwrap();
        let err = cache.cget("word").await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidCounter { ref key, .. } if key == "app:word"));
    }

    #[tokio::test]
    async fn test_cget_reads_plain_integer_set_through_codec() {
        let cache = cache(&MemoryStore::new());
        cache.set("n", &json!(42), None).await.unwrap();
        assert_eq!(cache.cget("n").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_flush_clears_every_namespace_and_database() {
        let store = MemoryStore::new();
        let app = cache(&store);
        let other: JsonCache<MemoryStore> = JsonCache::new(store.clone(), "other:");
        let elsewhere: JsonCache<MemoryStore> = JsonCache::new(store.select(3), "app:");

        app.set("a", &json!(1), None).await.unwrap();
        other.set("b", &json!(2), None).await.unwrap();
        elsewhere.set("c", &json!(3), None).await.unwrap();

        app.flush().await.unwrap();

        assert!(!app.exists("a").await.unwrap());
        assert!(!other.exists("b").await.unwrap());
        assert!(!elsewhere.exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_codec_and_decode_errors_propagate() {
        fn encode(v: &i64) -> Result<String> {
            Ok(format!("n={v}"))
        }
        fn decode(s: &str) -> Result<i64> {
            s.strip_prefix("n=")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| CacheError::Serialization(format!("bad counter text {s:?}")))
        }

        let store = MemoryStore::new();
        let cache = RedisCache::with_codec(store.clone(), "c:", FnCodec::new(encode, decode));

        cache.set("x", &7, None).await.unwrap();
        assert_eq!(store.get("c:x").await.unwrap().as_deref(), Some("n=7"));
        assert_eq!(cache.get("x", 0).await.unwrap(), 7);

        store.set("c:y", "garbage".to_string(), None).await.unwrap();
        let err = cache.get("y", 0).await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_batch_spans_record_keys() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let cache = cache(&MemoryStore::new());
        cache
            .mset([("a", json!(1)), ("b", json!(2))], None)
            .await
            .unwrap();
        cache.mget(["a", "b", "c"], Value::Null).await.unwrap();

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        let mset_line = output.lines().find(|l| l.contains("mset")).unwrap();
        assert!(mset_line.contains("count=2"));
        assert!(mset_line.contains("app:a") && mset_line.contains("app:b"));
        let mget_line = output.lines().find(|l| l.contains("mget")).unwrap();
        assert!(mget_line.contains("count=3"));
        assert!(mget_line.contains("app:c"));
    }

    #[test]
    fn test_key_and_accessors() {
        let cache = cache(&MemoryStore::new());
        assert_eq!(cache.prefix(), "app:");
        assert_eq!(cache.key("user:1"), "app:user:1");
        assert_eq!(cache.store().db(), 0);

        let bare: JsonCache<MemoryStore> = JsonCache::new(MemoryStore::new(), "");
        assert_eq!(bare.key("k"), "k");
    }
}

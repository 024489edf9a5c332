//! # Backbone Cache
//!
//! Async cache facade over a key-value store: every key is namespaced with a
//! fixed prefix, values are JSON-encoded (or passed through a custom codec),
//! and batch writes go out as one pipelined round trip.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        Application           │
//! └──────────────────────────────┘
//!               │  logical keys, typed values
//!               ▼
//! ┌──────────────────────────────┐
//! │   RedisCache (prefix+codec)  │
//! └──────────────────────────────┘
//!               │  namespaced keys, text
//!               ▼
//! ┌──────────────┐ ┌─────────────┐
//! │  RedisStore  │ │ MemoryStore │
//! └──────────────┘ └─────────────┘
//! ```
//!
//! ## Features
//!
//! - `redis`: Enable the Redis store (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use backbone_cache::{connect, CacheConfig};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let cache = connect(&CacheConfig::from_env().with_prefix("app:")).await?;
//!
//! cache.set("user:1", &json!({"name": "ada"}), Some(Duration::from_secs(60))).await?;
//! let user = cache.get("user:1", json!(null)).await?;
//!
//! // Rate-limit counter that expires a minute after the first hit
//! let hits = cache.cset("hits:1", 1, Some(Duration::from_secs(60))).await?;
//! ```
//!
//! `flush` wipes the whole store, including keys written under other
//! prefixes. Use `forget` to remove individual keys.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod store;

// Re-export commonly used types
pub use cache::{JsonCache, RedisCache, SharedRedisCache};
pub use codec::{Codec, FnCodec, JsonCodec};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use store::{MemoryStore, Store};
#[cfg(feature = "redis")]
pub use store::RedisStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Connect to Redis and build a JSON cache using the configured prefix
///
/// # Errors
///
/// Returns an error if the URL is invalid or the connection fails.
#[cfg(feature = "redis")]
pub async fn connect(config: &CacheConfig) -> Result<JsonCache<RedisStore>> {
    config.validate()?;
    let store = RedisStore::connect(&config.url).await?;
    Ok(JsonCache::new(store, config.prefix.clone()))
}

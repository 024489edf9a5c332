//! Cache error types

use thiserror::Error;

/// Errors surfaced by the cache facade.
///
/// Store and codec failures are passed through as-is; the facade adds no
/// error kinds of its own beyond counter parsing and configuration.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Counter at key {key} is not an integer: {value:?}")]
    InvalidCounter { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

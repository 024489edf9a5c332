//! # Cache Configuration
//!
//! Environment-based configuration for connecting a cache to Redis.

use std::env;

use crate::error::{CacheError, Result};

const URL_SCHEMES: [&str; 4] = ["redis://", "rediss://", "unix://", "redis+unix://"];

/// Redis cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Redis connection URL
    pub url: String,

    /// Namespace prepended to every cache key
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: String::new(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from `REDIS_URL` and `CACHE_PREFIX`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("REDIS_URL").unwrap_or(defaults.url),
            prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.prefix),
        }
    }

    /// Builder-style prefix override
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Reject URLs Redis clients cannot open
    pub fn validate(&self) -> Result<()> {
        if URL_SCHEMES.iter().any(|scheme| self.url.starts_with(scheme)) {
            Ok(())
        } else {
            Err(CacheError::Config(format!(
                "unsupported Redis URL {:?}, expected one of {}",
                self.url,
                URL_SCHEMES.join(", ")
            )))
        }
    }
}

//! # Value Codecs
//!
//! Conversion between in-memory values and the text stored in the cache.

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::marker::PhantomData;

use crate::error::Result;

/// Encode/decode pair fixed at cache construction.
///
/// `decode` must be the inverse of `encode` for every value written through
/// the cache.
pub trait Codec: Send + Sync {
    /// In-memory value type
    type Value;

    /// Convert a value to its stored text
    fn encode(&self, value: &Self::Value) -> Result<String>;

    /// Convert stored text back to a value
    fn decode(&self, text: &str) -> Result<Self::Value>;
}

/// JSON codec backed by `serde_json` (the default).
pub struct JsonCodec<V> {
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    pub const fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for JsonCodec<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for JsonCodec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<V> Codec for JsonCodec<V>
where
    V: Serialize + DeserializeOwned,
{
    type Value = V;

    fn encode(&self, value: &V) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, text: &str) -> Result<V> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Codec built from an explicit pair of functions.
pub struct FnCodec<V> {
    encode: fn(&V) -> Result<String>,
    decode: fn(&str) -> Result<V>,
}

impl<V> FnCodec<V> {
    pub const fn new(encode: fn(&V) -> Result<String>, decode: fn(&str) -> Result<V>) -> Self {
        Self { encode, decode }
    }
}

impl<V> Clone for FnCodec<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for FnCodec<V> {}

impl<V> fmt::Debug for FnCodec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCodec")
    }
}

impl<V> Codec for FnCodec<V> {
    type Value = V;

    fn encode(&self, value: &V) -> Result<String> {
        (self.encode)(value)
    }

    fn decode(&self, text: &str) -> Result<V> {
        (self.decode)(text)
    }
}

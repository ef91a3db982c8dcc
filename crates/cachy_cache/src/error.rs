use std::time::Duration;

use thiserror::Error;

/// Failures talking to the key-value store.
///
/// A missing key is not an error: `CacheStore::get` returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store {op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures encoding or decoding a stored entry.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode cache entry: {0}")]
    Decode(#[source] serde_json::Error),
}

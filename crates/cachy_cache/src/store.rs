use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::StoreError;

/// Byte-oriented key-value store with per-key TTL.
///
/// Implementations are shared by every in-flight request and must be safe to
/// call concurrently; the proxy itself never locks around them.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the key does not exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;

    /// Removes every key in the store, not only the ones this proxy wrote.
    async fn flush_all(&self) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

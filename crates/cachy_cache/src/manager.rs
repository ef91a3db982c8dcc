use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::{CacheKey, CachePolicy, CacheStore, CachedEntry};

/// Store access for the request path.
///
/// Nothing here fails the request: store errors and undecodable payloads are
/// logged and turned into a miss (reads) or a skipped write (writes).
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns the stored entry for `key`, or `None` on a miss of any kind.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CachedEntry> {
        let bytes = match self.store.get(key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(target: "cachy::cache", %key, "Key not found in store");
                return None;
            }
            Err(e) => {
                warn!(
                    target: "cachy::cache",
                    %key,
                    store = self.store.name(),
                    error = %e,
                    "Store read failed; treating as miss"
                );
                return None;
            }
        };

        match CachedEntry::decode(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    target: "cachy::cache",
                    %key,
                    error = %e,
                    "Stored payload is not a cache entry; treating as miss"
                );
                None
            }
        }
    }

    /// Stores `entry` under `key` when its status is cacheable.
    ///
    /// Returns whether the write happened.
    pub async fn populate(&self, key: &CacheKey, entry: &CachedEntry) -> bool {
        if !CachePolicy::is_cacheable(entry.status_code()) {
            debug!(target: "cachy::cache", %key, status = entry.status, "Status not cacheable");
            return false;
        }

        if self.ttl.is_zero() {
            debug!(target: "cachy::cache", %key, "TTL is zero; skipping store write");
            return false;
        }

        let payload = match entry.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "cachy::cache", %key, error = %e, "Failed to encode cache entry");
                return false;
            }
        };

        match self.store.set(key.as_str(), payload.into(), self.ttl).await {
            Ok(()) => {
                debug!(target: "cachy::cache", %key, ttl = ?self.ttl, "Response cached");
                true
            }
            Err(e) => {
                warn!(
                    target: "cachy::cache",
                    %key,
                    store = self.store.name(),
                    error = %e,
                    "Failed to cache response"
                );
                false
            }
        }
    }
}

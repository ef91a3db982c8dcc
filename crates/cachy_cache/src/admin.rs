use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{CacheStore, StoreError};

/// Operator-only cache invalidation.
///
/// Flushing wipes the whole store keyspace, including keys written by other
/// tenants of a shared store. It is never reachable from request handling.
pub struct CacheAdmin {
    store: Arc<dyn CacheStore>,
}

impl CacheAdmin {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn flush_all(&self) -> Result<(), StoreError> {
        warn!(
            target: "cachy::admin",
            store = self.store.name(),
            "Flushing every key in the store"
        );

        match self.store.flush_all().await {
            Ok(()) => {
                info!(target: "cachy::admin", store = self.store.name(), "Cache cleared");
                Ok(())
            }
            Err(e) => {
                error!(target: "cachy::admin", error = %e, "Cache flush failed");
                Err(e)
            }
        }
    }
}

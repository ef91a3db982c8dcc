//! Response cache for the proxy.
//!
//! Entries live in an external key-value store behind [`CacheStore`]:
//! [`RedisStore`] in production, [`MemoryStore`] for tests and local runs.
//! [`CacheManager`] wraps a store with the degrade-on-error rules of the
//! request path; [`CacheAdmin`] holds the destructive flush operation.

mod admin;
mod entry;
mod error;
mod key;
mod manager;
mod memory;
mod policy;
mod redis_store;
mod store;

pub use admin::CacheAdmin;
pub use entry::CachedEntry;
pub use error::{EntryError, StoreError};
pub use key::CacheKey;
pub use manager::CacheManager;
pub use memory::MemoryStore;
pub use policy::CachePolicy;
pub use redis_store::RedisStore;
pub use store::CacheStore;

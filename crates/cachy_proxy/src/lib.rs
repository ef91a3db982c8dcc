//! Cache-aside request pipeline.
//!
//! `CachingProxy::handle` services one inbound request: derive the key, try
//! the store, and on a miss forward to the origin, cache a 2xx answer and
//! relay the origin response.

mod error;
mod proxy;

pub use error::ProxyError;
pub use proxy::{CachingProxy, Origin, OriginClient};

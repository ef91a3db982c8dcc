pub mod headers;
pub mod responses;

pub use headers::{CacheStatus, X_CACHE};
pub use responses::{ProxyBody, ProxyResponse};

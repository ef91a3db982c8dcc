use http::StatusCode;

pub struct CachePolicy;

impl CachePolicy {
    /// Only 2xx origin responses are stored.
    pub fn is_cacheable(status: StatusCode) -> bool {
        status.is_success()
    }
}

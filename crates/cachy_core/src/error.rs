use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Connections were still open when the grace period ran out.
    #[error("connections still open after {grace:?} grace period")]
    Timeout { grace: Duration, open: usize },
}

//! Server runtime: listener, accept loop, per-connection hyper service and
//! graceful shutdown.

mod error;
pub mod master;

pub use error::ShutdownError;
pub use master::{Master, shutdown_signal};

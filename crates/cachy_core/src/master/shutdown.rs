use std::sync::Arc;
use std::time::Duration;

use hyper_util::server::graceful::GracefulShutdown;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::ShutdownError;

/// Resolves on SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(target: "cachy::master", error = ?e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(target: "cachy::master", error = ?e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(target: "cachy::master", signal = "SIGINT", "Signal received"),
        _ = terminate => info!(target: "cachy::master", signal = "SIGTERM", "Signal received"),
    }
}

/// Asks every watched connection to finish and waits up to `grace`.
pub(super) async fn drain(
    graceful: GracefulShutdown,
    semaphore: &Arc<Semaphore>,
    max_connections: usize,
    grace: Duration,
) -> Result<(), ShutdownError> {
    let open = max_connections.saturating_sub(semaphore.available_permits());
    info!(target: "cachy::master", open, ?grace, "Draining connections");

    match tokio::time::timeout(grace, graceful.shutdown()).await {
        Ok(()) => {
            info!(target: "cachy::master", "All connections closed");
            Ok(())
        }
        Err(_) => {
            let open = max_connections.saturating_sub(semaphore.available_permits());
            warn!(
                target: "cachy::master",
                open,
                ?grace,
                "Grace period exceeded; dropping remaining connections"
            );
            Err(ShutdownError::Timeout { grace, open })
        }
    }
}

use std::future::Future;
use std::sync::Arc;

use cachy_config::ProxyConfig;
use cachy_proxy::CachingProxy;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{info, instrument};

mod accept;
mod shutdown;
mod startup;

use accept::{accept_loop, bind_listener};
pub use shutdown::shutdown_signal;

/// Owns the listening socket and every connection task.
pub struct Master {
    cfg: Arc<ProxyConfig>,
    proxy: Arc<CachingProxy>,
}

impl Master {
    pub fn new(cfg: Arc<ProxyConfig>, proxy: Arc<CachingProxy>) -> Self {
        Self { cfg, proxy }
    }

    /// Binds the configured address and serves until SIGINT/SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = bind_listener(&self.cfg.listen_addr()).await?;
        self.run_until(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves, then
    /// drains open connections within the configured grace period.
    ///
    /// Returns [`crate::ShutdownError::Timeout`] (wrapped) when connections
    /// outlive the grace period.
    #[instrument(skip_all, fields(
        max_connections = self.cfg.max_connections,
        grace = ?self.cfg.shutdown_grace,
    ))]
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?.to_string();
        self.log_startup(&local_addr);

        let semaphore = self.init_semaphore();
        let graceful = GracefulShutdown::new();

        accept_loop(
            &listener,
            semaphore.clone(),
            self.proxy.clone(),
            &graceful,
            shutdown,
        )
        .await;
        drop(listener);

        shutdown::drain(
            graceful,
            &semaphore,
            self.cfg.max_connections,
            self.cfg.shutdown_grace,
        )
        .await?;

        info!(target: "cachy::master", "Server stopped");
        Ok(())
    }
}

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use super::Master;

impl Master {
    pub(super) fn log_startup(&self, local_addr: &str) {
        info!(
            target: "cachy::master",
            listen = %local_addr,
            origin = %self.cfg.origin_url(),
            max_connections = self.cfg.max_connections,
            "Caching proxy listening"
        );
    }

    pub(super) fn init_semaphore(&self) -> Arc<Semaphore> {
        let max_conns = self.cfg.max_connections;
        let semaphore = Arc::new(Semaphore::new(max_conns));
        info!(
            target: "cachy::master",
            max_conns,
            "Connection semaphore initialized"
        );
        semaphore
    }
}

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use cachy_cache::{CacheAdmin, CacheManager, CacheStore, MemoryStore, RedisStore};
use cachy_config::{CliOverrides, ProxyConfig};
use cachy_core::Master;
use cachy_proxy::CachingProxy;
use clap::Parser;
use tracing::{error, info, warn};
use utils::init_tracing;

/// `REDIS_ADDR` value selecting the in-process store.
const MEMORY_STORE: &str = "memory";

/// Caching HTTP forward proxy backed by Redis.
#[derive(Debug, Parser)]
#[command(name = "cachy", version)]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Origin base URL (overrides ORIGIN_URL)
    #[arg(long)]
    origin: Option<String>,

    /// Store address, host:port or redis:// URL (overrides REDIS_ADDR)
    #[arg(long)]
    redis_addr: Option<String>,

    /// debug, info, warn or error (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,

    /// Flush every key in the store and exit without serving
    #[arg(long)]
    clear_cache: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            origin: self.origin.clone(),
            redis_addr: self.redis_addr.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match ProxyConfig::from_env(&cli.overrides()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cfg.log_level());

    let report = cfg.validate();
    for warning in report.warnings() {
        warn!(target: "cachy::config", "{warning}");
    }
    if report.has_errors() {
        error!(target: "cachy::config", "Invalid configuration\n{}", report.format());
        return ExitCode::FAILURE;
    }
    cfg.log_summary();

    match run(cfg, cli.clear_cache).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: "cachy", error = %format!("{e:#}"), "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: ProxyConfig, clear_cache: bool) -> anyhow::Result<()> {
    let store = connect_store(&cfg).await?;

    if clear_cache {
        CacheAdmin::new(store)
            .flush_all()
            .await
            .context("failed to clear cache")?;
        info!(target: "cachy", "Cache cleared");
        return Ok(());
    }

    let cache = CacheManager::new(store.clone(), cfg.cache_expires());
    let proxy = CachingProxy::from_config(&cfg, cache).context("failed to set up origin client")?;

    let result = Master::new(Arc::new(cfg), Arc::new(proxy)).run().await;

    drop(store);
    info!(target: "cachy", "Store released");
    result
}

/// Connects to the configured store and checks it answers before serving.
async fn connect_store(cfg: &ProxyConfig) -> anyhow::Result<Arc<dyn CacheStore>> {
    if cfg.redis_addr == MEMORY_STORE {
        warn!(
            target: "cachy::store",
            "Using the in-process memory store; entries are not shared between instances"
        );
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = RedisStore::connect(&cfg.redis_addr, cfg.store_timeout)
        .await
        .with_context(|| format!("could not connect to store at {}", cfg.redis_addr))?;
    store
        .ping()
        .await
        .with_context(|| format!("store at {} did not answer PING", cfg.redis_addr))?;

    Ok(Arc::new(store))
}

use std::time::Duration;

use config::{Config, Environment};
use http::Uri;
use humantime::{format_duration, parse_duration};
use serde::Deserialize;
use tracing::info;

use crate::validation::{validate, ConfigReport};
use crate::ConfigError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_ORIGIN_URL: &str = "https://dummyjson.com";
pub const DEFAULT_REDIS_ADDR: &str = "localhost:6379";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_CACHE_EXPIRES: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_ORIGIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

// =======================================================
// RAW CONFIG (as read from env, everything is a string)
// =======================================================
#[derive(Debug, Deserialize)]
struct RawConfig {
    port: String,
    listen_host: String,
    origin_url: String,
    redis_addr: String,
    cache_expires: String,
    log_level: String,
    origin_timeout: String,
    store_timeout: String,
    shutdown_grace: String,
    max_connections: String,
}

/// Values given on the command line. They win over the environment.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub origin: Option<String>,
    pub redis_addr: Option<String>,
    pub log_level: Option<String>,
}

// =======================================================
// PROXY CONFIG (loaded once, shared read-only)
// =======================================================
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub host: String,
    pub origin_url: Uri,
    pub redis_addr: String,
    pub cache_expires: Duration,
    pub log_level: String,
    pub origin_timeout: Duration,
    pub store_timeout: Duration,
    pub shutdown_grace: Duration,
    pub max_connections: usize,

    /// Non-fatal problems found while loading (bad durations replaced by defaults).
    pub(crate) load_warnings: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.into(),
            origin_url: Uri::from_static(DEFAULT_ORIGIN_URL),
            redis_addr: DEFAULT_REDIS_ADDR.into(),
            cache_expires: DEFAULT_CACHE_EXPIRES,
            log_level: DEFAULT_LOG_LEVEL.into(),
            origin_timeout: DEFAULT_ORIGIN_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            load_warnings: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Loads from the process environment (`PORT`, `LISTEN_HOST`, `ORIGIN_URL`, ...).
    ///
    /// The listen host is read from `LISTEN_HOST`, never `HOST`, which shells
    /// often set to the machine name.
    pub fn from_env(overrides: &CliOverrides) -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default(), overrides)
    }

    /// Loads from an explicit environment source. Tests hand in a map here.
    pub fn from_environment(
        env: Environment,
        overrides: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        let built = Config::builder()
            .set_default("port", DEFAULT_PORT.to_string())?
            .set_default("listen_host", DEFAULT_HOST)?
            .set_default("origin_url", DEFAULT_ORIGIN_URL)?
            .set_default("redis_addr", DEFAULT_REDIS_ADDR)?
            .set_default("cache_expires", format_duration(DEFAULT_CACHE_EXPIRES).to_string())?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("origin_timeout", format_duration(DEFAULT_ORIGIN_TIMEOUT).to_string())?
            .set_default("store_timeout", format_duration(DEFAULT_STORE_TIMEOUT).to_string())?
            .set_default("shutdown_grace", format_duration(DEFAULT_SHUTDOWN_GRACE).to_string())?
            .set_default("max_connections", DEFAULT_MAX_CONNECTIONS.to_string())?
            .add_source(env)
            .set_override_option("port", overrides.port.map(|p| p.to_string()))?
            .set_override_option("origin_url", overrides.origin.clone())?
            .set_override_option("redis_addr", overrides.redis_addr.clone())?
            .set_override_option("log_level", overrides.log_level.clone())?
            .build()?;

        let raw: RawConfig = built.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let mut load_warnings = Vec::new();

        let port = raw
            .port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort { value: raw.port.clone() })?;

        let origin_url = parse_origin(raw.origin_url.trim())?;

        let max_connections = raw
            .max_connections
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidMaxConnections {
                value: raw.max_connections.clone(),
            })?;

        let mut duration_or_default = |key: &str, value: &str, default: Duration| {
            parse_duration(value.trim()).unwrap_or_else(|_| {
                load_warnings.push(format!(
                    "invalid duration format for {key} ('{value}'), using default {}",
                    format_duration(default)
                ));
                default
            })
        };

        let cache_expires =
            duration_or_default("CACHE_EXPIRES", &raw.cache_expires, DEFAULT_CACHE_EXPIRES);
        let origin_timeout =
            duration_or_default("ORIGIN_TIMEOUT", &raw.origin_timeout, DEFAULT_ORIGIN_TIMEOUT);
        let store_timeout =
            duration_or_default("STORE_TIMEOUT", &raw.store_timeout, DEFAULT_STORE_TIMEOUT);
        let shutdown_grace =
            duration_or_default("SHUTDOWN_GRACE", &raw.shutdown_grace, DEFAULT_SHUTDOWN_GRACE);

        Ok(Self {
            port,
            host: raw.listen_host.trim().to_string(),
            origin_url,
            redis_addr: raw.redis_addr.trim().to_string(),
            cache_expires,
            log_level: raw.log_level.trim().to_ascii_lowercase(),
            origin_timeout,
            store_timeout,
            shutdown_grace,
            max_connections,
            load_warnings,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn origin_url(&self) -> &Uri {
        &self.origin_url
    }

    pub fn cache_expires(&self) -> Duration {
        self.cache_expires
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub(crate) fn load_warnings(&self) -> &[String] {
        &self.load_warnings
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    pub fn log_summary(&self) {
        info!(
            target: "cachy::config",
            listen = %self.listen_addr(),
            origin = %self.origin_url,
            store = %self.redis_addr,
            cache_expires = %format_duration(self.cache_expires),
            origin_timeout = %format_duration(self.origin_timeout),
            store_timeout = %format_duration(self.store_timeout),
            shutdown_grace = %format_duration(self.shutdown_grace),
            max_connections = self.max_connections,
            log_level = %self.log_level,
            "Configuration loaded"
        );
    }
}

fn parse_origin(url: &str) -> Result<Uri, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidOrigin {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if url.is_empty() {
        return Err(invalid("empty"));
    }

    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        None => return Err(invalid("missing scheme")),
    }

    if uri.authority().is_none() {
        return Err(invalid("missing host"));
    }

    Ok(uri)
}

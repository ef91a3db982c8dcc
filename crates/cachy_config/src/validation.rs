use crate::ProxyConfig;

const KNOWN_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation output for a loaded proxy configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a proxy configuration and return a report of issues.
pub fn validate(cfg: &ProxyConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    for warning in cfg.load_warnings() {
        report.warn(warning.clone());
    }

    validate_listener(cfg, &mut report);
    validate_store(cfg, &mut report);
    validate_timeouts(cfg, &mut report);

    if !KNOWN_LOG_LEVELS.contains(&cfg.log_level.as_str()) {
        report.warn(format!(
            "log_level '{}' is not one of {:?}; falling back to info",
            cfg.log_level, KNOWN_LOG_LEVELS
        ));
    }

    report
}

fn validate_listener(cfg: &ProxyConfig, report: &mut ConfigReport) {
    if cfg.port == 0 {
        report.error("port must be between 1 and 65535");
    }
    if cfg.host.is_empty() {
        report.error("host is empty");
    }
    if cfg.max_connections == 0 {
        report.error("max_connections is 0; no client could ever be served");
    }
}

fn validate_store(cfg: &ProxyConfig, report: &mut ConfigReport) {
    if cfg.redis_addr.is_empty() {
        report.error("redis_addr is empty");
    }
    if cfg.cache_expires.is_zero() {
        report.warn("cache_expires is 0; responses will not be cached");
    }
}

fn validate_timeouts(cfg: &ProxyConfig, report: &mut ConfigReport) {
    if cfg.origin_timeout.is_zero() {
        report.error("origin_timeout is 0; every origin call would time out");
    }
    if cfg.store_timeout.is_zero() {
        report.error("store_timeout is 0; every store call would time out");
    }
    if cfg.shutdown_grace.is_zero() {
        report.warn("shutdown_grace is 0; in-flight requests are dropped on shutdown");
    }
}

mod error;
mod proxy;
mod validation;

pub use error::ConfigError;
pub use proxy::{CliOverrides, ProxyConfig};
pub use validation::{validate, ConfigReport};

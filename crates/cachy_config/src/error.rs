use thiserror::Error;

/// Fatal configuration problems. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid port format '{value}'")]
    InvalidPort { value: String },

    #[error("invalid origin url '{url}': {reason}")]
    InvalidOrigin { url: String, reason: String },

    #[error("invalid max_connections '{value}'")]
    InvalidMaxConnections { value: String },
}

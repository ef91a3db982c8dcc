use std::time::Duration;

use cachy_http::ProxyResponse;
use cachy_http::responses::{send_400, send_500, send_502};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid origin url '{url}': {reason}")]
    InvalidOrigin { url: String, reason: &'static str },

    #[error("error reading request body: {0}")]
    RequestBody(String),

    #[error("failed to build origin request: {0}")]
    Build(#[from] http::Error),

    #[error("origin request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("origin did not answer within {0:?}")]
    Timeout(Duration),

    #[error("error reading origin response body: {0}")]
    ResponseBody(#[source] hyper::Error),

    #[error("origin response body not read within {0:?}")]
    ResponseBodyTimeout(Duration),
}

impl ProxyError {
    /// Client-facing response for a failed miss.
    pub fn to_response(&self) -> ProxyResponse {
        match self {
            ProxyError::RequestBody(_) => send_400(),
            ProxyError::ResponseBody(_) | ProxyError::ResponseBodyTimeout(_) => send_500(),
            ProxyError::InvalidOrigin { .. }
            | ProxyError::Build(_)
            | ProxyError::Transport(_)
            | ProxyError::Timeout(_) => send_502(),
        }
    }
}

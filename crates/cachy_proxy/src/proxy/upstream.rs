use cachy_http::ProxyBody;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderValue, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use super::path::prefix_path;
use crate::ProxyError;

/// Pooled HTTP/1.1 client for the origin, plain TCP or TLS.
pub type OriginClient = Client<HttpsConnector<HttpConnector>, ProxyBody>;

pub(super) fn build_client() -> OriginClient {
    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();

    Client::builder(TokioExecutor::new()).build(https)
}

/// The single upstream every miss is forwarded to.
#[derive(Debug, Clone)]
pub struct Origin {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    host: HeaderValue,
}

impl Origin {
    pub fn new(url: &Uri) -> Result<Self, ProxyError> {
        let invalid = |reason: &'static str| ProxyError::InvalidOrigin {
            url: url.to_string(),
            reason,
        };

        let scheme = url.scheme().cloned().ok_or_else(|| invalid("missing scheme"))?;
        if scheme != Scheme::HTTP && scheme != Scheme::HTTPS {
            return Err(invalid("scheme must be http or https"));
        }

        let authority = url.authority().cloned().ok_or_else(|| invalid("missing host"))?;
        let host = HeaderValue::from_str(authority.as_str())
            .map_err(|_| invalid("host is not a valid header value"))?;

        Ok(Self {
            scheme,
            authority,
            base_path: url.path().trim_end_matches('/').to_string(),
            host,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Value sent as `Host` on every forwarded request.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host
    }

    /// Absolute origin URI for an inbound request target.
    pub fn upstream_uri(&self, req_uri: &Uri) -> Result<Uri, http::Error> {
        let path_and_query = req_uri
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(prefix_path(&self.base_path, path_and_query))
            .build()
    }
}

use bytes::Bytes;
use cachy_http::ProxyBody;
use cachy_http::headers::strip_hop_by_hop;
use http::{Request, header, request};
use http_body_util::Full;

use super::Origin;
use crate::ProxyError;

/// Builds the origin request for a miss.
///
/// Method, path, query, end-to-end headers and body are forwarded as
/// received. `Host` becomes the origin authority and hop-by-hop headers are
/// dropped; the client connection handles its own framing.
pub(super) fn forwarded_request(
    origin: &Origin,
    parts: &request::Parts,
    body: Bytes,
) -> Result<Request<ProxyBody>, ProxyError> {
    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.insert(header::HOST, origin.host_header().clone());

    let mut req = Request::builder()
        .method(parts.method.clone())
        .uri(origin.upstream_uri(&parts.uri)?)
        .body(Full::new(body))?;
    *req.headers_mut() = headers;

    Ok(req)
}

use bytes::Bytes;
use cachy_cache::CachedEntry;
use cachy_http::headers::strip_hop_by_hop;
use cachy_http::{CacheStatus, ProxyResponse};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;

/// Replays a stored entry: stored status, stored headers, `X-Cache: HIT`.
pub(super) fn replay(entry: &CachedEntry) -> ProxyResponse {
    let mut resp = Response::new(Full::new(entry.body.clone()));
    *resp.status_mut() = entry.status_code();
    *resp.headers_mut() = entry.header_map();
    CacheStatus::Hit.mark(resp.headers_mut());
    resp
}

/// Relays an origin response: every end-to-end header with all its values,
/// then `X-Cache: MISS` over whatever the origin sent.
pub(super) fn relay(status: StatusCode, mut headers: HeaderMap, body: Bytes) -> ProxyResponse {
    strip_hop_by_hop(&mut headers);

    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    *resp.headers_mut() = headers;
    CacheStatus::Miss.mark(resp.headers_mut());
    resp
}

#[cfg(test)]
mod tests {
    use super::{relay, replay};
    use bytes::Bytes;
    use cachy_cache::CachedEntry;
    use http::{HeaderMap, HeaderValue, StatusCode, header};

    #[test]
    fn relay_keeps_multi_values_and_overrides_x_cache() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert("x-cache", HeaderValue::from_static("HIT from upstream"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let resp = relay(StatusCode::OK, headers, Bytes::from_static(b"ok"));

        assert_eq!(resp.headers().get_all(header::SET_COOKIE).iter().count(), 2);
        assert_eq!(resp.headers().get_all("x-cache").iter().count(), 1);
        assert_eq!(resp.headers().get("x-cache").unwrap(), "MISS");
        assert!(resp.headers().get(header::TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn replay_uses_stored_status_and_marks_hit() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let entry = CachedEntry::from_response(StatusCode::CREATED, &headers, Bytes::from_static(b"{}"));

        let resp = replay(&entry);

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(resp.headers().get("x-cache").unwrap(), "HIT");
    }
}

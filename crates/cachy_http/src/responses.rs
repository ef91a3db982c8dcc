use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header};
use http_body_util::Full;

/// Every response the proxy writes is fully buffered.
pub type ProxyBody = Full<Bytes>;
pub type ProxyResponse = Response<ProxyBody>;

/// Generic helper for a response with a binary body.
pub fn send_response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> ProxyResponse {
    let mut resp = Response::new(Full::new(body.into()));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

fn send_text_response(status: StatusCode, body: &'static str) -> ProxyResponse {
    send_response(status, "text/plain; charset=utf-8", Bytes::from_static(body.as_bytes()))
}

pub fn send_400() -> ProxyResponse {
    send_text_response(StatusCode::BAD_REQUEST, "Error reading request\n")
}

pub fn send_500() -> ProxyResponse {
    send_text_response(StatusCode::INTERNAL_SERVER_ERROR, "Error reading response\n")
}

pub fn send_502() -> ProxyResponse {
    send_text_response(StatusCode::BAD_GATEWAY, "Error forwarding request\n")
}

#[cfg(test)]
mod tests {
    use super::{send_500, send_502};
    use http::{StatusCode, header};

    #[test]
    fn error_helpers_set_status_and_content_type() {
        let resp = send_502();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(send_500().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

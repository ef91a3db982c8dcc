use std::fmt::Display;
use std::time::Duration;

use cachy_cache::{CacheKey, CacheManager, CachedEntry};
use cachy_config::ProxyConfig;
use cachy_http::{CacheStatus, ProxyResponse};
use http::{Request, Uri};
use http_body_util::BodyExt;
use hyper::body::Body;
use tokio::time::{Instant, timeout_at};
use tracing::{Span, debug, error, field, info, instrument, warn};

use crate::ProxyError;

mod headers;
mod path;
mod response;
mod upstream;

pub use upstream::{Origin, OriginClient};

/// The cache-aside proxy.
///
/// Holds everything a request needs: the origin, a pooled client for it and
/// the cache. Built once at startup and shared behind an `Arc` by every
/// connection.
pub struct CachingProxy {
    origin: Origin,
    client: OriginClient,
    cache: CacheManager,
    origin_timeout: Duration,
}

impl CachingProxy {
    pub fn new(
        origin_url: &Uri,
        cache: CacheManager,
        origin_timeout: Duration,
    ) -> Result<Self, ProxyError> {
        Ok(Self {
            origin: Origin::new(origin_url)?,
            client: upstream::build_client(),
            cache,
            origin_timeout,
        })
    }

    pub fn from_config(cfg: &ProxyConfig, cache: CacheManager) -> Result<Self, ProxyError> {
        Self::new(cfg.origin_url(), cache, cfg.origin_timeout)
    }

    /// Services one inbound request.
    ///
    /// Never fails: origin problems become 502/500 responses and store
    /// problems degrade to a miss. Every response carries `X-Cache`.
    #[instrument(
        skip(self, req),
        fields(method = %req.method(), key = field::Empty)
    )]
    pub async fn handle<B>(&self, req: Request<B>) -> ProxyResponse
    where
        B: Body,
        B::Error: Display,
    {
        let key = CacheKey::from_uri(req.uri());
        Span::current().record("key", key.as_str());

        if let Some(entry) = self.cache.lookup(&key).await {
            info!(target: "cachy::proxy", %key, status = entry.status, "Cache HIT");
            return response::replay(&entry);
        }

        info!(target: "cachy::proxy", %key, "Cache MISS");

        match self.fetch(&key, req).await {
            Ok(resp) => resp,
            Err(e) => {
                match &e {
                    ProxyError::RequestBody(_) => {
                        warn!(target: "cachy::proxy", %key, error = %e, "Error reading request")
                    }
                    _ => error!(
                        target: "cachy::proxy",
                        %key,
                        origin = %self.origin.authority(),
                        error = %e,
                        "Origin request failed"
                    ),
                }
                let mut resp = e.to_response();
                CacheStatus::Miss.mark(resp.headers_mut());
                resp
            }
        }
    }

    /// Miss path: forward, read the whole answer, cache it if 2xx, relay it.
    ///
    /// The timeout covers the origin call and the body read together.
    async fn fetch<B>(&self, key: &CacheKey, req: Request<B>) -> Result<ProxyResponse, ProxyError>
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| ProxyError::RequestBody(e.to_string()))?
            .to_bytes();

        let forwarded = headers::forwarded_request(&self.origin, &parts, body)?;
        debug!(
            target: "cachy::proxy",
            method = %forwarded.method(),
            upstream = %forwarded.uri(),
            "Forwarding request to origin"
        );

        let deadline = Instant::now() + self.origin_timeout;
        let origin_resp = timeout_at(deadline, self.client.request(forwarded))
            .await
            .map_err(|_| ProxyError::Timeout(self.origin_timeout))??;

        let (head, body) = origin_resp.into_parts();
        let body = timeout_at(deadline, body.collect())
            .await
            .map_err(|_| ProxyError::ResponseBodyTimeout(self.origin_timeout))?
            .map_err(ProxyError::ResponseBody)?
            .to_bytes();

        debug!(
            target: "cachy::proxy",
            %key,
            status = head.status.as_u16(),
            bytes = body.len(),
            "Origin responded"
        );

        let entry = CachedEntry::from_response(head.status, &head.headers, body.clone());
        self.cache.populate(key, &entry).await;

        Ok(response::relay(head.status, head.headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::CachingProxy;
    use async_trait::async_trait;
    use bytes::Bytes;
    use cachy_cache::{
        CacheKey, CacheManager, CacheStore, CachedEntry, MemoryStore, StoreError,
    };
    use http::{HeaderMap, Method, Request, Response, StatusCode, Uri, header};
    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local origin that counts every request it serves.
    struct TestOrigin {
        addr: SocketAddr,
        hits: Arc<AtomicUsize>,
    }

    impl TestOrigin {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let hits = Arc::new(AtomicUsize::new(0));

            let counter = hits.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let svc = service_fn(move |req: Request<Incoming>| {
                            counter.fetch_add(1, Ordering::SeqCst);
                            async move { Ok::<_, Infallible>(route(req).await) }
                        });
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), svc)
                            .await;
                    });
                }
            });

            Self { addr, hits }
        }

        fn url(&self) -> Uri {
            format!("http://{}", self.addr).parse().unwrap()
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    async fn route(req: Request<Incoming>) -> Response<Full<Bytes>> {
        let text = |status: StatusCode, body: String| {
            Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Full::new(Bytes::from(body)))
                .unwrap()
        };

        match req.uri().path() {
            "/greet" => text(StatusCode::OK, "hello".into()),
            "/cookies" => Response::builder()
                .header(header::SET_COOKIE, "a=1")
                .header(header::SET_COOKIE, "b=2")
                .header("x-cache", "origin-says-hit")
                .header("x-origin", "yes")
                .body(Full::new(Bytes::from_static(b"ok")))
                .unwrap(),
            "/echo" => {
                let method = req.method().clone();
                let target = req.uri().to_string();
                let host = req
                    .headers()
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let body = req.into_body().collect().await.unwrap().to_bytes();
                text(
                    StatusCode::OK,
                    format!("{method} {target} host={host} body={}", String::from_utf8_lossy(&body)),
                )
            }
            "/slow" => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                text(StatusCode::OK, "late".into())
            }
            _ => text(StatusCode::NOT_FOUND, "not found".into()),
        }
    }

    struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        fn name(&self) -> &'static str {
            "down"
        }
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn flush_all(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn proxy(origin: Uri, store: Arc<dyn CacheStore>, ttl: Duration) -> CachingProxy {
        CachingProxy::new(&origin, CacheManager::new(store, ttl), Duration::from_secs(5)).unwrap()
    }

    async fn send(proxy: &CachingProxy, req: Request<Full<Bytes>>) -> (StatusCode, HeaderMap, Bytes) {
        let (parts, body) = proxy.handle(req).await.into_parts();
        (parts.status, parts.headers, body.collect().await.unwrap().to_bytes())
    }

    async fn get(proxy: &CachingProxy, target: &str) -> (StatusCode, HeaderMap, Bytes) {
        send(proxy, Request::get(target).body(Full::new(Bytes::new())).unwrap()).await
    }

    fn unused_addr() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[tokio::test]
    async fn greet_is_miss_then_hit_with_one_origin_call() {
        let origin = TestOrigin::start().await;
        let proxy = proxy(origin.url(), Arc::new(MemoryStore::new()), Duration::from_secs(600));

        let (status, headers, body) = get(&proxy, "/greet").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("x-cache").unwrap(), "MISS");
        assert_eq!(body, "hello");

        let (status, headers, body) = get(&proxy, "/greet").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("x-cache").unwrap(), "HIT");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(body, "hello");

        assert_eq!(origin.hits(), 1);
    }

    #[tokio::test]
    async fn non_2xx_is_relayed_but_never_cached() {
        let origin = TestOrigin::start().await;
        let store = Arc::new(MemoryStore::new());
        let proxy = proxy(origin.url(), store.clone(), Duration::from_secs(600));

        for _ in 0..2 {
            let (status, headers, body) = get(&proxy, "/missing").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(headers.get("x-cache").unwrap(), "MISS");
            assert_eq!(body, "not found");
        }

        assert_eq!(origin.hits(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn query_string_is_part_of_the_key() {
        let origin = TestOrigin::start().await;
        let proxy = proxy(origin.url(), Arc::new(MemoryStore::new()), Duration::from_secs(600));

        get(&proxy, "/greet?lang=en").await;
        let (_, headers, _) = get(&proxy, "/greet?lang=es").await;

        assert_eq!(headers.get("x-cache").unwrap(), "MISS");
        assert_eq!(origin.hits(), 2);
    }

    #[tokio::test]
    async fn origin_headers_are_relayed_and_x_cache_wins() {
        let origin = TestOrigin::start().await;
        let proxy = proxy(origin.url(), Arc::new(MemoryStore::new()), Duration::from_secs(600));

        let (_, headers, _) = get(&proxy, "/cookies").await;
        let cookies: Vec<_> = headers.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(headers.get("x-origin").unwrap(), "yes");
        assert_eq!(headers.get_all("x-cache").iter().count(), 1);
        assert_eq!(headers.get("x-cache").unwrap(), "MISS");

        let (_, headers, _) = get(&proxy, "/cookies").await;
        assert_eq!(headers.get("x-cache").unwrap(), "HIT");
        assert_eq!(headers.get(header::SET_COOKIE).unwrap(), "a=1, b=2");
    }

    #[tokio::test]
    async fn request_is_forwarded_with_origin_host() {
        let origin = TestOrigin::start().await;
        let proxy = proxy(origin.url(), Arc::new(MemoryStore::new()), Duration::from_secs(600));

        let req = Request::builder()
            .method(Method::POST)
            .uri("/echo?x=1")
            .header(header::HOST, "proxy.local")
            .body(Full::new(Bytes::from_static(b"payload")))
            .unwrap();
        let (status, _, body) = send(&proxy, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("POST /echo?x=1 host={} body=payload", origin.addr));
    }

    #[tokio::test]
    async fn store_down_still_serves_every_request() {
        let origin = TestOrigin::start().await;
        let proxy = proxy(origin.url(), Arc::new(DownStore), Duration::from_secs(600));

        for _ in 0..3 {
            let (status, headers, body) = get(&proxy, "/greet").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(headers.get("x-cache").unwrap(), "MISS");
            assert_eq!(body, "hello");
        }

        assert_eq!(origin.hits(), 3);
    }

    #[tokio::test]
    async fn expired_entry_is_fetched_again() {
        let origin = TestOrigin::start().await;
        let proxy = proxy(origin.url(), Arc::new(MemoryStore::new()), Duration::from_millis(50));

        get(&proxy, "/greet").await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        let (_, headers, _) = get(&proxy, "/greet").await;

        assert_eq!(headers.get("x-cache").unwrap(), "MISS");
        assert_eq!(origin.hits(), 2);
    }

    #[tokio::test]
    async fn unreachable_origin_is_502_and_not_cached() {
        let url: Uri = format!("http://{}", unused_addr()).parse().unwrap();
        let store = Arc::new(MemoryStore::new());
        let proxy = proxy(url, store.clone(), Duration::from_secs(600));

        let (status, headers, body) = get(&proxy, "/greet").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(headers.get("x-cache").unwrap(), "MISS");
        assert_eq!(body, "Error forwarding request\n");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn truncated_origin_body_is_500_and_not_cached() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nabc")
                    .await;
            }
        });

        let url: Uri = format!("http://{addr}").parse().unwrap();
        let store = Arc::new(MemoryStore::new());
        let proxy = proxy(url, store.clone(), Duration::from_secs(600));

        let (status, headers, body) = get(&proxy, "/greet").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(headers.get("x-cache").unwrap(), "MISS");
        assert_eq!(body, "Error reading response\n");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn slow_origin_times_out_with_502() {
        let origin = TestOrigin::start().await;
        let manager = CacheManager::new(Arc::new(MemoryStore::new()), Duration::from_secs(600));
        let proxy = CachingProxy::new(&origin.url(), manager, Duration::from_millis(100)).unwrap();

        let (status, headers, _) = get(&proxy, "/slow").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(headers.get("x-cache").unwrap(), "MISS");
    }

    #[tokio::test]
    async fn hit_never_calls_the_origin() {
        let url: Uri = format!("http://{}", unused_addr()).parse().unwrap();
        let manager = CacheManager::new(Arc::new(MemoryStore::new()), Duration::from_secs(600));
        let entry = CachedEntry::from_response(StatusCode::OK, &HeaderMap::new(), Bytes::from_static(b"cached"));
        let key = CacheKey::from_uri(&"/greet".parse().unwrap());
        assert!(manager.populate(&key, &entry).await);

        let proxy = CachingProxy::new(&url, manager, Duration::from_secs(5)).unwrap();
        let (status, headers, body) = get(&proxy, "/greet").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("x-cache").unwrap(), "HIT");
        assert_eq!(body, "cached");
    }
}

//! Per-IP throttling middleware.
//!
//! # Request Flow
//!
//! ```text
//! Request ─► resolve client IP ─► Limiter::allow(ip) ─┬─ allowed ─► inner service
//!                                                    └─ denied  ─► rejection response
//! ```
//!
//! # Response Headers
//!
//! Every response, allowed or not, carries:
//! - `X-Rate-Limit-Limit`: configured maximum per window
//! - `X-Rate-Limit-Duration`: configured window, e.g. `1m0s`
//!
//! # Rejections
//!
//! A denied request never reaches the inner service. It gets the limiter's
//! status code (default `429`) and content type (default `application/json`)
//! with the body:
//!
//! ```json
//! {"error":"Request limit reached for this ip address"}
//! ```
//!
//! The peer address used for the `RemoteAddr` lookup comes from Axum's
//! [`ConnectInfo`] extension, so serve the router with
//! `into_make_service_with_connect_info::<SocketAddr>()`.

use std::net::SocketAddr;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Request, Response};
use tower::{Layer, Service};
use tracing::{trace, warn};

use super::ip::resolve_client_ip;
use crate::limiter::Limiter;
use crate::metrics;

/// Header carrying the configured maximum.
pub const X_RATE_LIMIT_LIMIT: &str = "x-rate-limit-limit";

/// Header carrying the configured window.
pub const X_RATE_LIMIT_DURATION: &str = "x-rate-limit-duration";

/// Body of every rejection response.
pub const LIMIT_REACHED_BODY: &str = r#"{"error":"Request limit reached for this ip address"}"#;

/// Throttling layer for Tower middleware stacks.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = Limiter::new(20, Duration::from_secs(60))?;
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(ThrottleLayer::new(limiter));
/// ```
#[derive(Clone, Debug)]
pub struct ThrottleLayer {
    limiter: Limiter,
}

impl ThrottleLayer {
    pub fn new(limiter: Limiter) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = ThrottleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ThrottleService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Wrap `inner` so that it only sees requests `limiter` allows.
pub fn throttle<S>(limiter: Limiter, inner: S) -> ThrottleService<S> {
    ThrottleLayer::new(limiter).layer(inner)
}

/// Throttling service wrapper.
#[derive(Clone, Debug)]
pub struct ThrottleService<S> {
    inner: S,
    limiter: Limiter,
}

impl<S> Service<Request<Body>> for ThrottleService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limit = self.limiter.limit_header().clone();
        let window = self.limiter.window_header().clone();

        let peer_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());
        let client_ip = resolve_client_ip(req.headers(), peer_addr.as_deref(), self.limiter.ip_lookups());

        if !self.limiter.allow(&client_ip) {
            metrics::record_request_rejected();
            warn!(
                client_ip = %client_ip,
                path = %req.uri().path(),
                "Request limit reached for ip address"
            );

            let mut response = limit_reached_response(&self.limiter);
            set_rate_limit_headers(response.headers_mut(), limit, window);
            return Box::pin(async move { Ok(response) });
        }

        metrics::record_request_allowed();
        trace!(client_ip = %client_ip, "Request within rate limit");

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let mut response = inner.call(req).await?;
            set_rate_limit_headers(response.headers_mut(), limit, window);
            Ok(response)
        })
    }
}

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: HeaderValue, window: HeaderValue) {
    headers.insert(X_RATE_LIMIT_LIMIT, limit);
    headers.insert(X_RATE_LIMIT_DURATION, window);
}

fn limit_reached_response(limiter: &Limiter) -> Response<Body> {
    let mut response = Response::new(Body::from(LIMIT_REACHED_BODY));
    *response.status_mut() = limiter.status_code();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, limiter.content_type().clone());
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::{ServiceExt, service_fn};

    async fn ok_handler(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
        Ok(Response::new(Body::from("ok")))
    }

    fn request_from(peer: &str) -> Request<Body> {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        req
    }

    fn request_forwarded_for(ip: &str) -> Request<Body> {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_limit_middleware_rejects_after_max() {
        let limiter = Limiter::new(20, Duration::from_secs(60)).unwrap();
        let svc = throttle(limiter, service_fn(ok_handler));

        for i in 0..22 {
            let response = svc.clone().oneshot(request_from("12.16.1.1:8080")).await.unwrap();

            if i < 20 {
                assert_eq!(response.status(), StatusCode::OK, "request {i}");
                assert_eq!(body_string(response).await, "ok");
            } else {
                assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS, "request {i}");
                assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
                assert_eq!(body_string(response).await, LIMIT_REACHED_BODY);
            }
        }
    }

    #[tokio::test]
    async fn test_informational_headers_on_every_response() {
        let limiter = Limiter::new(1, Duration::from_secs(60)).unwrap();
        let svc = throttle(limiter, service_fn(ok_handler));

        let allowed = svc.clone().oneshot(request_from("12.16.1.1:8080")).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(allowed.headers()[X_RATE_LIMIT_LIMIT], "1");
        assert_eq!(allowed.headers()[X_RATE_LIMIT_DURATION], "1m0s");
        assert!(allowed.headers().get(CONTENT_TYPE).is_none());

        let denied = svc.oneshot(request_from("12.16.1.1:8080")).await.unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(denied.headers()[X_RATE_LIMIT_LIMIT], "1");
        assert_eq!(denied.headers()[X_RATE_LIMIT_DURATION], "1m0s");
    }

    #[tokio::test]
    async fn test_rejected_request_skips_inner_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let inner = service_fn(move |_req: Request<Body>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Infallible>(Response::new(Body::empty())) }
        });

        let limiter = Limiter::new(2, Duration::from_secs(60)).unwrap();
        let svc = throttle(limiter, inner);

        for _ in 0..5 {
            svc.clone().oneshot(request_from("12.16.1.1:8080")).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_custom_status_and_content_type() {
        let limiter = Limiter::new(1, Duration::from_secs(10))
            .unwrap()
            .with_status_code(503)
            .unwrap()
            .with_content_type("application/problem+json")
            .unwrap();
        let svc = throttle(limiter, service_fn(ok_handler));

        svc.clone().oneshot(request_from("12.16.1.1:8080")).await.unwrap();
        let denied = svc.oneshot(request_from("12.16.1.1:8080")).await.unwrap();

        assert_eq!(denied.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(denied.headers()[CONTENT_TYPE], "application/problem+json");
        assert_eq!(denied.headers()[X_RATE_LIMIT_DURATION], "10s");
        assert_eq!(body_string(denied).await, LIMIT_REACHED_BODY);
    }

    #[tokio::test]
    async fn test_clients_are_throttled_independently() {
        let limiter = Limiter::new(1, Duration::from_secs(60)).unwrap();
        let svc = throttle(limiter.clone(), service_fn(ok_handler));

        let first = svc.clone().oneshot(request_forwarded_for("203.0.113.7")).await.unwrap();
        let other = svc.clone().oneshot(request_forwarded_for("198.51.100.2")).await.unwrap();
        let again = svc.oneshot(request_forwarded_for("203.0.113.7")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(other.status(), StatusCode::OK);
        assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[tokio::test]
    async fn test_unresolvable_clients_share_one_bucket() {
        let limiter = Limiter::new(1, Duration::from_secs(60)).unwrap();
        let svc = throttle(limiter, service_fn(ok_handler));

        // Loopback peer and private header: no usable IP in either request
        let first = svc.clone().oneshot(request_from("127.0.0.1:9000")).await.unwrap();
        let second = svc.oneshot(request_forwarded_for("10.0.0.8")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_layer_on_axum_router() {
        let limiter = Limiter::new(2, Duration::from_secs(60)).unwrap();
        let app = Router::new()
            .route("/", get(|| async { "hello" }))
            .layer(ThrottleLayer::new(limiter));

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let response = app.clone().oneshot(request_from("81.2.69.160:4000")).await.unwrap();
            statuses.push(response.status());
        }

        assert_eq!(
            statuses,
            [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }
}

//! Limiter configuration and the shared per-IP registry.
//!
//! A [`Limiter`] bundles the immutable settings of one throttle (maximum
//! events, window, rejection status and content type, IP lookup order)
//! with the [`Registry`] of per-key buckets. Clones share the same registry,
//! so a limiter can be handed to any number of middleware instances while
//! still enforcing one budget per client.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use http_throttle::Limiter;
//!
//! let limiter = Limiter::new(20, Duration::from_secs(60))?
//!     .with_status_code(503)?
//!     .with_ip_lookups(["X-Real-IP", "RemoteAddr"]);
//!
//! assert!(limiter.allow("203.0.113.7"));
//! # Ok::<(), http_throttle::ThrottleError>(())
//! ```

pub mod bucket;
pub mod registry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode};

pub use bucket::{BucketFactory, GovernorBucket, GovernorBucketFactory, TokenBucket};
pub use registry::Registry;

use crate::error::{ThrottleError, ThrottleResult};
use crate::middleware::ip::REMOTE_ADDR;
use crate::utils::format_window;

/// Content type of the rejection body unless overridden.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Status returned for rejected requests unless overridden.
pub const DEFAULT_STATUS_CODE: StatusCode = StatusCode::TOO_MANY_REQUESTS;

/// Where the client IP is looked up, highest priority first.
pub const DEFAULT_IP_LOOKUPS: [&str; 3] = ["X-Forwarded-For", "X-Real-IP", REMOTE_ADDR];

/// Per-IP rate limiter: settings plus the shared bucket registry.
#[derive(Clone)]
pub struct Limiter {
    max: u32,
    window: Duration,
    content_type: HeaderValue,
    status_code: StatusCode,
    ip_lookups: Arc<[String]>,
    limit_header: HeaderValue,
    window_header: HeaderValue,
    registry: Arc<Registry>,
}

impl Limiter {
    /// Create a limiter allowing `max` requests per `window` for each client IP.
    ///
    /// Buckets refill continuously at one request every `window / max`.
    /// Defaults: `application/json` content type, `429` status, lookups
    /// `X-Forwarded-For`, `X-Real-IP`, then the peer address.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::ZeroMax`] if `max` is 0, or
    /// [`ThrottleError::ZeroInterval`] if the window is too short to spread
    /// `max` events over it.
    pub fn new(max: u32, window: Duration) -> ThrottleResult<Self> {
        let factory = GovernorBucketFactory::new(max, window)?;

        let rendered = format_window(window);
        let window_header = HeaderValue::from_str(&rendered)
            .map_err(|e| ThrottleError::Config(format!("window {rendered:?} is not a valid header: {e}")))?;

        Ok(Self {
            max,
            window,
            content_type: HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
            status_code: DEFAULT_STATUS_CODE,
            ip_lookups: DEFAULT_IP_LOOKUPS.iter().map(|h| h.to_string()).collect(),
            limit_header: HeaderValue::from(max),
            window_header,
            registry: Arc::new(Registry::new(factory)),
        })
    }

    /// Override the `Content-Type` of rejection responses.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidContentType`] if the value cannot be
    /// used as a header value.
    pub fn with_content_type(mut self, content_type: &str) -> ThrottleResult<Self> {
        self.content_type = HeaderValue::from_str(content_type)
            .map_err(|_| ThrottleError::InvalidContentType(content_type.to_string()))?;
        Ok(self)
    }

    /// Override the status code of rejection responses.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidStatusCode`] outside `100..=999`.
    pub fn with_status_code(mut self, status: u16) -> ThrottleResult<Self> {
        self.status_code =
            StatusCode::from_u16(status).map_err(|_| ThrottleError::InvalidStatusCode(status))?;
        Ok(self)
    }

    /// Replace the ordered list of IP sources.
    ///
    /// Each entry is a header name, or [`REMOTE_ADDR`] for the transport
    /// peer address.
    pub fn with_ip_lookups<I, T>(mut self, lookups: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ip_lookups = lookups.into_iter().map(Into::into).collect();
        self
    }

    /// Whether one more request from `key` is allowed now.
    #[inline]
    pub fn allow(&self, key: &str) -> bool {
        self.registry.allow(key)
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn content_type(&self) -> &HeaderValue {
        &self.content_type
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn ip_lookups(&self) -> &[String] {
        &self.ip_lookups
    }

    /// Value of the `X-Rate-Limit-Limit` header.
    pub fn limit_header(&self) -> &HeaderValue {
        &self.limit_header
    }

    /// Value of the `X-Rate-Limit-Duration` header.
    pub fn window_header(&self) -> &HeaderValue {
        &self.window_header
    }

    /// Number of client keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.registry.len()
    }
}

impl fmt::Debug for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limiter")
            .field("max", &self.max)
            .field("window", &self.window)
            .field("content_type", &self.content_type)
            .field("status_code", &self.status_code)
            .field("ip_lookups", &self.ip_lookups)
            .field("tracked_keys", &self.tracked_keys())
            .finish_non_exhaustive()
    }
}

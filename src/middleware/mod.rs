//! HTTP middleware for per-IP request throttling.
//!
//! - **IP Resolution** ([`ip`]): picks the client address a request is
//!   throttled under, skipping private and non-routable candidates
//! - **Throttling** ([`rate_limit`]): Tower layer that admits or rejects each
//!   request against the shared [`Limiter`](crate::Limiter)
//!
//! # Architecture
//!
//! ```text
//! Request → ThrottleService → resolve_client_ip → Limiter::allow → Handler
//!                ↓                                      ↓
//!       X-Rate-Limit-* headers                 429 + JSON error body
//! ```

pub mod ip;
pub mod rate_limit;

pub use ip::{REMOTE_ADDR, is_global_unicast, is_private_subnet, is_valid_ip, resolve_client_ip};
pub use rate_limit::{
    LIMIT_REACHED_BODY, ThrottleLayer, ThrottleService, X_RATE_LIMIT_DURATION, X_RATE_LIMIT_LIMIT,
    throttle,
};

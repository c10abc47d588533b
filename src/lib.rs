//! # HTTP Throttle
//!
//! Per-IP request rate limiting for Axum and Tower services:
//!
//! - **Token buckets**: one continuously refilled bucket per client IP,
//!   created on first sight and shared across all clones of a limiter
//! - **Spoofing-aware IP resolution**: configurable header priority,
//!   rightmost-first proxy chain scanning, private and non-routable
//!   addresses skipped
//! - **Structured rejections**: configurable status and content type with a
//!   fixed JSON error body, plus `X-Rate-Limit-*` headers on every response
//! - **Observability**: `tracing` events and `metrics` counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ThrottleLayer / ThrottleService             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  resolve_client_ip (headers + peer address → key)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Limiter (settings) → Registry (key → bucket, one Mutex)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TokenBucket (Governor GCRA, continuous refill)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use std::time::Duration;
//!
//! use axum::{Router, routing::get};
//! use http_throttle::{Limiter, ThrottleLayer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 20 requests per minute and client IP
//!     let limiter = Limiter::new(20, Duration::from_secs(60))?;
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "hello" }))
//!         .layer(ThrottleLayer::new(limiter));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{OctetParseError, ThrottleError, ThrottleResult};
pub use limiter::Limiter;
pub use middleware::{ThrottleLayer, ThrottleService, throttle};
pub use routes::build_router;
pub use state::AppState;

//! Demo server routing with the throttle in front of every route.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │    Throttling    │ ← 429 + JSON body if the client IP is over budget
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::ThrottleLayer;
use crate::state::AppState;
use crate::utils::format_window;

/// Build the demo router with all routes and middleware configured.
///
/// The throttling layer reuses `state.limiter`, so handlers and middleware
/// observe the same registry. Serve the result with
/// `into_make_service_with_connect_info::<SocketAddr>()` for `RemoteAddr`
/// lookups to see the peer address.
pub fn build_router(state: AppState) -> Router {
    let limiter = state.limiter.clone();

    info!(
        max = limiter.max(),
        window = %format_window(limiter.window()),
        lookups = ?limiter.ip_lookups(),
        status = limiter.status_code().as_u16(),
        "Rate limiting enabled"
    );

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::stats))
        .layer(TraceLayer::new_for_http())
        // Applied last, so it runs first in the request pipeline
        .layer(ThrottleLayer::new(limiter))
        .with_state(state)
}

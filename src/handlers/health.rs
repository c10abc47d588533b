//! Demo endpoints served behind the throttle.
//!
//! # Endpoints
//!
//! - `GET /` - Plain greeting, the downstream handler being protected
//! - `GET /health` - Liveness with version and timestamp
//! - `GET /stats` - Throttle settings and the number of tracked clients
//!
//! All of them sit behind the throttling layer, so they count against the
//! caller's budget like any other request.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::models::{HealthResponse, StatsResponse};
use crate::state::AppState;
use crate::utils::format_window;

pub async fn index() -> &'static str {
    "Hello from behind the throttle!"
}

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Throttle statistics endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "max": 20,
///   "window": "1m0s",
///   "tracked_keys": 12,
///   "uptime_seconds": 3600
/// }
/// ```
#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let limiter = &state.limiter;

    Json(StatsResponse {
        max: limiter.max(),
        window: format_window(limiter.window()),
        tracked_keys: limiter.tracked_keys(),
        uptime_seconds: state.uptime_seconds(),
    })
}

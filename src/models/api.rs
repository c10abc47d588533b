use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Throttle statistics response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Requests allowed per window and client
    pub max: u32,
    /// Window, e.g. "1m0s"
    pub window: String,
    /// Client keys currently holding a bucket
    pub tracked_keys: usize,
    /// Seconds since the server started
    pub uptime_seconds: u64,
}

//! Prometheus metrics for throttling observability.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `throttle_requests_total` - Throttling decisions (label: outcome = allowed | rejected)
//!
//! ## Gauges
//! - `throttle_tracked_keys` - Client keys currently holding a bucket
//!
//! The recording functions are cheap no-ops until a recorder is installed,
//! so the library can call them unconditionally. The demo server installs
//! the Prometheus exporter with [`init_metrics`].

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "throttle_requests_total";
    pub const TRACKED_KEYS: &str = "throttle_tracked_keys";
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts the Prometheus HTTP listener on `metrics_addr` and registers
/// metric descriptions.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::REQUESTS_TOTAL,
        "Total number of requests seen by the throttle, by outcome"
    );
    describe_gauge!(
        names::TRACKED_KEYS,
        "Number of client keys with a rate limit bucket"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_request_allowed() {
    counter!(names::REQUESTS_TOTAL, "outcome" => "allowed").increment(1);
}

pub fn record_request_rejected() {
    counter!(names::REQUESTS_TOTAL, "outcome" => "rejected").increment(1);
}

/// Update the tracked keys gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_keys(count: usize) {
    gauge!(names::TRACKED_KEYS).set(count as f64);
}

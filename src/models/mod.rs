//! Response models for the demo server.

pub mod api;

pub use api::{HealthResponse, StatsResponse};

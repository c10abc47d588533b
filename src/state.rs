//! Shared application state for the demo server's handlers.
//!
//! The [`Limiter`] held here is the same instance the throttling layer
//! uses (clones share one registry), so `/stats` reports live numbers.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::ThrottleResult;
use crate::limiter::Limiter;

/// Shared application state for Axum handlers.
///
/// Cloned for each request handler; all internal data is cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Limiter shared with the throttling layer
    pub limiter: Limiter,
    /// Application configuration
    pub config: Arc<Config>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// Create application state, building the limiter from `config`.
    ///
    /// # Errors
    ///
    /// Returns the limiter construction error for invalid throttle settings.
    pub fn new(config: Config) -> ThrottleResult<Self> {
        let limiter = config.limiter()?;

        Ok(Self {
            limiter,
            config: Arc::new(config),
            started_at: Instant::now(),
        })
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

//! Demo server configuration loaded from environment variables.
//!
//! The library itself is configured programmatically through
//! [`Limiter`](crate::Limiter); this module only serves the bundled binary.
//! All settings have development defaults and can be set through the
//! environment or a `.env` file.
//!
//! # Server
//!
//! - `HOST` / `PORT`: bind address (default: `0.0.0.0:3000`)
//!
//! # Throttling
//!
//! - `THROTTLE_MAX`: requests allowed per window and client (default: 20)
//! - `THROTTLE_WINDOW_SECS`: window length in seconds (default: 60)
//! - `THROTTLE_IP_LOOKUPS`: comma-separated IP sources, highest priority
//!   first (default: `X-Forwarded-For,X-Real-IP,RemoteAddr`)
//! - `THROTTLE_STATUS_CODE`: status of rejected requests (default: 429)
//! - `THROTTLE_CONTENT_TYPE`: content type of rejected requests
//!   (default: `application/json`)
//!
//! # Observability
//!
//! - `METRICS_PORT`: Prometheus endpoint port (default: 9090, 0 = disabled)
//! - `LOG_FORMAT`: `text` or `json` (default: `text`)
//! - `RUST_LOG`: tracing filter (default: `info`)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use axum::http::StatusCode;

use crate::error::{ThrottleError, ThrottleResult};
use crate::limiter::{DEFAULT_CONTENT_TYPE, DEFAULT_IP_LOOKUPS, Limiter};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?} (expected text or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Demo server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Throttling Configuration
    // =========================================================================
    /// Requests allowed per window and client (default: 20)
    pub throttle_max: u32,

    /// Window over which `throttle_max` applies (default: 60 seconds)
    pub throttle_window: Duration,

    /// IP sources, highest priority first
    pub ip_lookups: Vec<String>,

    /// Status code for rejected requests (default: 429)
    pub status_code: u16,

    /// Content type for rejected requests (default: "application/json")
    pub content_type: String,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,

    /// Log output format (default: text)
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `ThrottleError::Config` if a variable cannot be parsed or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> ThrottleResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            throttle_max: Self::parse_env("THROTTLE_MAX", 20)?,
            throttle_window: Duration::from_secs(Self::parse_env("THROTTLE_WINDOW_SECS", 60)?),
            ip_lookups: Self::parse_ip_lookups(),
            status_code: Self::parse_env("THROTTLE_STATUS_CODE", StatusCode::TOO_MANY_REQUESTS.as_u16())?,
            content_type: env::var("THROTTLE_CONTENT_TYPE")
                .unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.to_string()),

            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Text)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    fn validate(&self) -> ThrottleResult<()> {
        if self.throttle_max == 0 {
            return Err(ThrottleError::Config(
                "THROTTLE_MAX must be greater than 0".to_string(),
            ));
        }

        if self.throttle_window.is_zero() {
            return Err(ThrottleError::Config(
                "THROTTLE_WINDOW_SECS must be greater than 0".to_string(),
            ));
        }

        if StatusCode::from_u16(self.status_code).is_err() {
            return Err(ThrottleError::Config(format!(
                "THROTTLE_STATUS_CODE ({}) is not a valid HTTP status",
                self.status_code
            )));
        }

        if self.ip_lookups.is_empty() {
            return Err(ThrottleError::Config(
                "THROTTLE_IP_LOOKUPS must name at least one source".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the limiter described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns the [`Limiter`] construction error for invalid settings.
    pub fn limiter(&self) -> ThrottleResult<Limiter> {
        Limiter::new(self.throttle_max, self.throttle_window)?
            .with_ip_lookups(self.ip_lookups.iter().cloned())
            .with_status_code(self.status_code)?
            .with_content_type(&self.content_type)
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> ThrottleResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| ThrottleError::Config(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse the IP lookup order from the environment.
    fn parse_ip_lookups() -> Vec<String> {
        env::var("THROTTLE_IP_LOOKUPS")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Self::split_list(&s))
            .unwrap_or_else(|| DEFAULT_IP_LOOKUPS.iter().map(|h| h.to_string()).collect())
    }

    fn split_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// Default configuration for testing and development.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            throttle_max: 20,
            throttle_window: Duration::from_secs(60),
            ip_lookups: DEFAULT_IP_LOOKUPS.iter().map(|h| h.to_string()).collect(),
            status_code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            metrics_port: 9090,
            log_format: LogFormat::Text,
        }
    }
}

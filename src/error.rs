use std::num::ParseIntError;

use thiserror::Error;

/// Errors raised while building or configuring a [`Limiter`](crate::Limiter).
///
/// None of these are produced on the request path: once a limiter is in
/// service the only user-visible failure is the rate-limit rejection itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("max must be greater than 0")]
    ZeroMax,

    #[error("window {window:?} is too short for {max} events: refill interval rounds to zero")]
    ZeroInterval { max: u32, window: std::time::Duration },

    #[error("invalid rejection status code: {0}")]
    InvalidStatusCode(u16),

    #[error("invalid content type: {0:?}")]
    InvalidContentType(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure to read the leading octets of a dotted address.
///
/// Kept separate from the `bool` answer of
/// [`is_private_subnet`](crate::middleware::ip::is_private_subnet) so that
/// "not private" and "could not tell" are never conflated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OctetParseError {
    #[error("address {address:?} has no octet at position {position}")]
    MissingOctet { address: String, position: usize },

    #[error("invalid octet {octet:?} in address {address:?}: {source}")]
    InvalidOctet {
        address: String,
        octet: String,
        #[source]
        source: ParseIntError,
    },
}

/// Convenience type alias for Results with ThrottleError.
pub type ThrottleResult<T> = Result<T, ThrottleError>;

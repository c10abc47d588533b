//! Fuzz testing for client IP resolution.
//!
//! Header values and peer addresses come straight from the network, so the
//! classifier must never panic on them and must only ever return an empty
//! key or a public address.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the classifier fuzz target
//! cargo +nightly fuzz run fuzz_classifier
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_classifier -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use axum::http::{HeaderMap, HeaderValue};
use http_throttle::middleware::{
    REMOTE_ADDR, is_global_unicast, is_private_subnet, is_valid_ip, resolve_client_ip,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct ClassifierInput {
    forwarded_for: Vec<String>,
    real_ip: Option<String>,
    peer_addr: Option<String>,
}

fuzz_target!(|input: ClassifierInput| {
    let mut headers = HeaderMap::new();
    for value in &input.forwarded_for {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.append("x-forwarded-for", value);
        }
    }
    if let Some(Ok(value)) = input.real_ip.as_deref().map(HeaderValue::from_str) {
        headers.insert("x-real-ip", value);
    }

    let lookups = [
        "X-Forwarded-For".to_string(),
        "X-Real-IP".to_string(),
        REMOTE_ADDR.to_string(),
    ];
    let ip = resolve_client_ip(&headers, input.peer_addr.as_deref(), &lookups);

    // Only empty or valid public addresses may come back
    assert!(ip.is_empty() || is_valid_ip(&ip));

    for value in &input.forwarded_for {
        let _ = is_valid_ip(value);
        let _ = is_private_subnet(value);
        if let Ok(ip) = value.parse() {
            let _ = is_global_unicast(&ip);
        }
    }
});

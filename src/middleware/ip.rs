//! Client IP resolution for rate limiting.
//!
//! Resolves the key a request is throttled under by walking an ordered list
//! of sources (see [`DEFAULT_IP_LOOKUPS`](crate::limiter::DEFAULT_IP_LOOKUPS)):
//!
//! - A header name: every value of that header is split on commas and the
//!   entries are tried **from last to first**. Proxies append the address
//!   they received the request from, so the rightmost entries are the ones
//!   written by the hops closest to this service.
//! - The [`REMOTE_ADDR`] sentinel: the transport peer address, with any
//!   port stripped. It is never read as a header.
//!
//! The first candidate that passes [`is_valid_ip`] wins. When nothing
//! qualifies the key is the empty string, which is throttled as one shared
//! bucket.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! **Header sources are client-controlled.** Skipping private and
//! non-routable addresses stops the cheapest spoofing tricks (`127.0.0.1`,
//! `10.0.0.1`), but a client talking to this service directly can still put
//! any public address in `X-Forwarded-For`. Deploy behind a reverse proxy
//! that overwrites these headers, or configure the lookups as
//! `["RemoteAddr"]` when there is no proxy.
//!
//! # Address Classification
//!
//! ```text
//!   candidate ──parse──► IpAddr ──canonical──► global unicast? ──► private? ──► valid
//!       │                                          │                  │
//!       └── not an IP: skip                        └── no: skip       └── yes / unreadable: skip
//! ```

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

use crate::error::OctetParseError;

/// Lookup entry standing for the transport peer address.
pub const REMOTE_ADDR: &str = "RemoteAddr";

/// Resolve the rate-limit key for a request.
///
/// # Arguments
///
/// * `headers` - Request headers
/// * `peer_addr` - Transport peer address (`"ip:port"`), if known
/// * `lookups` - Header names and/or [`REMOTE_ADDR`], highest priority first
///
/// # Returns
///
/// The first valid client IP as it appeared in its source, or an empty
/// string when no source yields one.
pub fn resolve_client_ip(headers: &HeaderMap, peer_addr: Option<&str>, lookups: &[String]) -> String {
    for lookup in lookups {
        if lookup == REMOTE_ADDR {
            if let Some(peer) = peer_addr {
                let ip = strip_port(peer);
                if is_valid_ip(&ip) {
                    return ip.into_owned();
                }
            }
            continue;
        }

        let candidate = headers
            .get_all(lookup.as_str())
            .iter()
            .rev()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.rsplit(','))
            .map(str::trim)
            .find(|ip| is_valid_ip(ip));

        if let Some(ip) = candidate {
            return ip.to_string();
        }
    }

    String::new()
}

/// Strip the port from a peer address.
///
/// Handles `1.2.3.4:80` and `[::1]:80`; a bare IP is returned unchanged.
/// Anything else is cut at the first `:`.
fn strip_port(addr: &str) -> Cow<'_, str> {
    let addr = addr.trim();

    if let Ok(socket) = addr.parse::<SocketAddr>() {
        return Cow::Owned(socket.ip().to_string());
    }
    if addr.parse::<IpAddr>().is_ok() {
        return Cow::Borrowed(addr);
    }

    Cow::Borrowed(addr.split(':').next().unwrap_or_default().trim())
}

/// Whether `candidate` is usable as a client IP.
///
/// It must parse as an IP address, be global unicast and fall outside the
/// private ranges. IPv4-mapped IPv6 addresses are judged as IPv4; for other
/// IPv6 addresses the unique-local range `fc00::/7` counts as private.
pub fn is_valid_ip(candidate: &str) -> bool {
    let Ok(ip) = candidate.parse::<IpAddr>() else {
        return false;
    };
    let ip = ip.to_canonical();

    if !is_global_unicast(&ip) {
        return false;
    }

    match ip {
        IpAddr::V4(v4) => matches!(is_private_subnet(&v4.to_string()), Ok(false)),
        IpAddr::V6(v6) => !v6.is_unique_local(),
    }
}

/// Whether `ip` is a global unicast address.
///
/// Excludes unspecified, loopback, multicast and link-local addresses, and
/// the IPv4 limited broadcast address. Private ranges are still global
/// unicast; see [`is_private_subnet`].
pub fn is_global_unicast(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_unspecified()
                || v4.is_loopback()
                || v4.is_multicast()
                || v4.is_link_local()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            !(v6.is_unspecified()
                || v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unicast_link_local())
        }
    }
}

/// Whether a dotted IPv4 address lies in `10/8`, `172.16/12` or `192.168/16`.
///
/// Only the first two octets are read.
///
/// # Errors
///
/// Returns [`OctetParseError`] when either of the first two octets is
/// missing or not a number. This is distinct from `Ok(false)`.
pub fn is_private_subnet(ip: &str) -> Result<bool, OctetParseError> {
    let mut octets = ip.split('.');
    let first = parse_octet(ip, octets.next(), 0)?;
    let second = parse_octet(ip, octets.next(), 1)?;

    Ok(first == 10 || (first == 172 && (16..=31).contains(&second)) || (first == 192 && second == 168))
}

fn parse_octet(address: &str, octet: Option<&str>, position: usize) -> Result<u32, OctetParseError> {
    let octet = octet.ok_or_else(|| OctetParseError::MissingOctet {
        address: address.to_string(),
        position,
    })?;

    octet
        .trim()
        .parse()
        .map_err(|source| OctetParseError::InvalidOctet {
            address: address.to_string(),
            octet: octet.to_string(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn lookups(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn default_lookups() -> Vec<String> {
        lookups(&["X-Forwarded-For", "X-Real-IP", REMOTE_ADDR])
    }

    #[test]
    fn test_resolve_remote_addr_strips_port() {
        let ip = resolve_client_ip(
            &HeaderMap::new(),
            Some("12.168.0.1:4390"),
            &lookups(&[REMOTE_ADDR]),
        );
        assert_eq!(ip, "12.168.0.1");
    }

    #[test]
    fn test_resolve_real_ip_when_xff_absent() {
        let headers = headers(&[("x-real-ip", "12.168.2.1")]);
        let ip = resolve_client_ip(&headers, None, &lookups(&["X-Forwarded-For", "X-Real-IP"]));
        assert_eq!(ip, "12.168.2.1");
    }

    #[test]
    fn test_resolve_xff_rightmost_first() {
        let headers = headers(&[(
            "x-forwarded-for",
            "203.0.113.50, 70.41.3.18, 150.172.238.178",
        )]);
        let ip = resolve_client_ip(&headers, None, &default_lookups());
        assert_eq!(ip, "150.172.238.178");
    }

    #[test]
    fn test_resolve_xff_skips_private_hops() {
        let headers = headers(&[("x-forwarded-for", "203.0.113.50, 10.0.0.1, 192.168.1.1")]);
        let ip = resolve_client_ip(&headers, None, &default_lookups());
        assert_eq!(ip, "203.0.113.50");
    }

    #[test]
    fn test_resolve_xff_with_whitespace() {
        let headers = headers(&[("x-forwarded-for", "   8.8.4.4   ,  ")]);
        let ip = resolve_client_ip(&headers, None, &default_lookups());
        assert_eq!(ip, "8.8.4.4");
    }

    #[test]
    fn test_resolve_repeated_header_lines() {
        // Later header lines are closer to this service
        let headers = headers(&[
            ("x-forwarded-for", "8.8.8.8"),
            ("x-forwarded-for", "9.9.9.9, 10.0.0.1"),
        ]);
        let ip = resolve_client_ip(&headers, None, &default_lookups());
        assert_eq!(ip, "9.9.9.9");
    }

    #[test]
    fn test_resolve_falls_through_private_headers() {
        let headers = headers(&[
            ("x-forwarded-for", "10.1.2.3, 172.20.0.4"),
            ("x-real-ip", "192.168.0.10"),
        ]);
        let ip = resolve_client_ip(&headers, Some("81.2.69.160:51234"), &default_lookups());
        assert_eq!(ip, "81.2.69.160");
    }

    #[test]
    fn test_resolve_header_priority_order() {
        let headers = headers(&[
            ("x-forwarded-for", "203.0.113.9"),
            ("x-real-ip", "198.51.100.4"),
        ]);

        let ip = resolve_client_ip(&headers, None, &default_lookups());
        assert_eq!(ip, "203.0.113.9");

        let ip = resolve_client_ip(&headers, None, &lookups(&["X-Real-IP", "X-Forwarded-For"]));
        assert_eq!(ip, "198.51.100.4");
    }

    #[test]
    fn test_resolve_remote_addr_before_headers() {
        let headers = headers(&[("x-forwarded-for", "203.0.113.9")]);
        let ip = resolve_client_ip(
            &headers,
            Some("81.2.69.160:443"),
            &lookups(&[REMOTE_ADDR, "X-Forwarded-For"]),
        );
        assert_eq!(ip, "81.2.69.160");
    }

    #[test]
    fn test_resolve_remote_addr_is_not_a_header() {
        let headers = headers(&[("remoteaddr", "8.8.8.8")]);
        let ip = resolve_client_ip(&headers, None, &lookups(&[REMOTE_ADDR]));
        assert_eq!(ip, "");
    }

    #[test]
    fn test_resolve_nothing_valid_is_empty() {
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None, &default_lookups()), "");

        let headers = headers(&[("x-forwarded-for", "unknown, not-an-ip, ")]);
        let ip = resolve_client_ip(&headers, Some("127.0.0.1:8080"), &default_lookups());
        assert_eq!(ip, "");
    }

    #[test]
    fn test_resolve_invalid_lookup_name_is_skipped() {
        let headers = headers(&[("x-real-ip", "203.0.113.9")]);
        let ip = resolve_client_ip(&headers, None, &lookups(&["Not A Header", "X-Real-IP"]));
        assert_eq!(ip, "203.0.113.9");
    }

    #[test]
    fn test_resolve_ipv6_sources() {
        let headers = headers(&[("x-forwarded-for", "2001:db8::1, fd00::1")]);
        let ip = resolve_client_ip(&headers, None, &default_lookups());
        assert_eq!(ip, "2001:db8::1");

        let ip = resolve_client_ip(
            &HeaderMap::new(),
            Some("[2001:db8::42]:443"),
            &lookups(&[REMOTE_ADDR]),
        );
        assert_eq!(ip, "2001:db8::42");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("12.168.0.1:4390"), "12.168.0.1");
        assert_eq!(strip_port(" 12.168.0.1 "), "12.168.0.1");
        assert_eq!(strip_port("[2001:db8::1]:80"), "2001:db8::1");
        assert_eq!(strip_port("2001:db8::1"), "2001:db8::1");
        assert_eq!(strip_port("example.com:80"), "example.com");
    }

    #[test]
    fn test_is_valid_ip() {
        assert!(is_valid_ip("8.8.8.8"));
        assert!(is_valid_ip("12.168.0.1"));
        assert!(is_valid_ip("2001:db8::1"));
        assert!(is_valid_ip("::ffff:8.8.8.8"));

        // Not an address
        assert!(!is_valid_ip(""));
        assert!(!is_valid_ip("unknown"));
        assert!(!is_valid_ip("8.8.8.8:80"));
        assert!(!is_valid_ip("256.1.1.1"));

        // Not global unicast
        assert!(!is_valid_ip("0.0.0.0"));
        assert!(!is_valid_ip("127.0.0.1"));
        assert!(!is_valid_ip("169.254.10.1"));
        assert!(!is_valid_ip("224.0.0.1"));
        assert!(!is_valid_ip("255.255.255.255"));
        assert!(!is_valid_ip("::"));
        assert!(!is_valid_ip("::1"));
        assert!(!is_valid_ip("fe80::1"));
        assert!(!is_valid_ip("ff02::1"));

        // Private
        assert!(!is_valid_ip("10.0.0.1"));
        assert!(!is_valid_ip("172.16.5.4"));
        assert!(!is_valid_ip("192.168.1.1"));
        assert!(!is_valid_ip("::ffff:10.0.0.1"));
        assert!(!is_valid_ip("fd12:3456::1"));
    }

    #[test]
    fn test_is_private_subnet_ranges() {
        for ip in ["10.0.0.1", "172.16.0.0", "172.31.255.255", "192.168.0.0"] {
            assert_eq!(is_private_subnet(ip), Ok(true), "{ip} should be private");
        }

        for ip in [
            "9.255.255.255",
            "11.0.0.0",
            "172.15.0.0",
            "172.32.0.0",
            "192.167.255.255",
            "192.169.0.0",
        ] {
            assert_eq!(is_private_subnet(ip), Ok(false), "{ip} should not be private");
        }
    }

    #[test]
    fn test_is_private_subnet_parse_errors() {
        assert!(matches!(
            is_private_subnet("abc.1.2.3"),
            Err(OctetParseError::InvalidOctet { ref octet, .. }) if octet == "abc"
        ));
        assert!(matches!(
            is_private_subnet("10.x.0.1"),
            Err(OctetParseError::InvalidOctet { .. })
        ));
        assert!(matches!(
            is_private_subnet("10"),
            Err(OctetParseError::MissingOctet { position: 1, .. })
        ));
        assert!(is_private_subnet("").is_err());
        assert!(is_private_subnet("2001:db8::1").is_err());
    }

    #[test]
    fn test_is_global_unicast() {
        assert!(is_global_unicast(&"8.8.8.8".parse().unwrap()));
        assert!(is_global_unicast(&"10.0.0.1".parse().unwrap()));
        assert!(is_global_unicast(&"2001:db8::1".parse().unwrap()));
        assert!(!is_global_unicast(&"127.0.0.1".parse().unwrap()));
        assert!(!is_global_unicast(&"fe80::1".parse().unwrap()));
    }
}

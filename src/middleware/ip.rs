//! Client address extraction for rate-limit keys.
//!
//! # Sources
//!
//! By default the key is the TCP peer address from Axum's
//! [`ConnectInfo`](axum::extract::ConnectInfo) extension. It is only present
//! when the server is started with
//! `into_make_service_with_connect_info::<SocketAddr>()`.
//!
//! With `TRUST_FORWARDED_HEADERS=true` the proxy headers are consulted first:
//!
//! 1. `X-Forwarded-For` (first non-empty entry of the comma-separated list)
//! 2. `X-Real-IP`
//! 3. the peer address
//!
//! # Spoofing
//!
//! Forwarded headers are client-controlled unless a reverse proxy overwrites
//! them. Only enable trust when every request passes through such a proxy,
//! otherwise a client can pick its own rate-limit bucket on each request.
//!
//! # The "unknown" Fallback
//!
//! Requests with no usable address share the [`UNKNOWN_IP`] key, so they are
//! throttled collectively.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::trace;

/// Key used when no client address can be determined.
pub const UNKNOWN_IP: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    FromXff(&'a str),
    FromRealIp(&'a str),
    NotFound,
}

#[inline]
fn extract_ip_from_headers<B>(req: &Request<B>) -> ExtractedIp<'_> {
    // "client, proxy1, proxy2" - the client is first
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next().map(str::trim)
        && !first_ip.is_empty()
    {
        return ExtractedIp::FromXff(first_ip);
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return ExtractedIp::FromRealIp(value.trim());
    }

    ExtractedIp::NotFound
}

#[inline]
fn peer_address<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Determine the client address used as the rate-limit key.
///
/// Returns `Cow::Borrowed(UNKNOWN_IP)` without allocating when nothing is
/// available; call `.into_owned()` before moving it into an async block.
#[inline]
pub fn extract_client_ip<B>(req: &Request<B>, trust_forwarded_headers: bool) -> Cow<'static, str> {
    if trust_forwarded_headers {
        match extract_ip_from_headers(req) {
            ExtractedIp::FromXff(ip) => {
                trace!(client_ip = %ip, "Client IP from X-Forwarded-For");
                return Cow::Owned(ip.to_string());
            }
            ExtractedIp::FromRealIp(ip) => {
                trace!(client_ip = %ip, "Client IP from X-Real-IP");
                return Cow::Owned(ip.to_string());
            }
            ExtractedIp::NotFound => {}
        }
    }

    match peer_address(req) {
        Some(addr) => Cow::Owned(addr.ip().to_string()),
        None => Cow::Borrowed(UNKNOWN_IP),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn with_peer(builder: axum::http::request::Builder, peer: &str) -> Request<Body> {
        let mut req = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[test]
    fn test_peer_address_used_by_default() {
        let req = with_peer(Request::builder(), "203.0.113.7:51000");
        assert_eq!(extract_client_ip(&req, false), "203.0.113.7");
    }

    #[test]
    fn test_forwarded_headers_ignored_when_untrusted() {
        let req = with_peer(
            Request::builder().header("x-forwarded-for", "10.0.0.1"),
            "203.0.113.7:51000",
        );
        assert_eq!(extract_client_ip(&req, false), "203.0.113.7");
    }

    #[test]
    fn test_xff_first_entry_when_trusted() {
        let req = with_peer(
            Request::builder().header("x-forwarded-for", "  192.168.1.1  , 10.0.0.1"),
            "203.0.113.7:51000",
        );
        assert_eq!(extract_client_ip(&req, true), "192.168.1.1");
    }

    #[test]
    fn test_xff_priority_over_real_ip() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1")
            .header("x-real-ip", "192.168.1.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&req, true), "10.0.0.1");
    }

    #[test]
    fn test_real_ip_when_xff_empty() {
        let req = Request::builder()
            .header("x-forwarded-for", " ")
            .header("x-real-ip", "192.168.1.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&req, true), "192.168.1.1");
    }

    #[test]
    fn test_trusted_without_headers_falls_back_to_peer() {
        let req = with_peer(Request::builder(), "[::1]:8080");
        assert_eq!(extract_client_ip(&req, true), "::1");
    }

    #[test]
    fn test_unknown_is_borrowed() {
        let req = Request::builder().body(Body::empty()).unwrap();

        let ip = extract_client_ip(&req, true);
        assert_eq!(ip, UNKNOWN_IP);
        assert!(matches!(ip, Cow::Borrowed(_)));
    }

    #[test]
    fn test_long_proxy_chain() {
        let long_chain = (0..100)
            .map(|i| format!("10.0.0.{}", i % 256))
            .collect::<Vec<_>>()
            .join(", ");
        let req = Request::builder()
            .header("x-forwarded-for", long_chain)
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&req, true), "10.0.0.0");
    }
}

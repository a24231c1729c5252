//! Per-IP request throttling for auth and shopping endpoints.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers that carry the shopper's address, most trusted first.
const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

/// Keys requests by the shopper's IP, looking through proxy headers before
/// falling back to the socket peer.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

/// First parseable client IP in the proxy headers.
///
/// `X-Forwarded-For` may hold a chain; the left-most entry is the client.
#[must_use]
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok())
    })
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        forwarded_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer keyed on [`ClientIpKeyExtractor`].
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_every: Duration, burst: u32) -> RateLimiterLayer {
    let mut builder = GovernorConfigBuilder::default().key_extractor(ClientIpKeyExtractor);
    builder.period(replenish_every).burst_size(burst);
    let config = builder
        .finish()
        .unwrap_or_else(|| unreachable!("non-zero period and burst"));
    GovernorLayer::new(Arc::new(config))
}

/// Login, signup, OTP and password reset: about 10 per minute, burst of 5.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    limiter(Duration::from_secs(6), 5)
}

/// Cart, checkout, wallet and account writes: about 100 per minute, burst of 50.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    limiter(Duration::from_millis(600), 50)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_forwarded_chain_uses_left_most() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(
            forwarded_ip(&headers),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(forwarded_ip(&headers), Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_garbage_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        headers.insert("fly-client-ip", HeaderValue::from_static("192.0.2.4"));
        assert_eq!(forwarded_ip(&headers), Some("192.0.2.4".parse().unwrap()));
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }
}

//! Rate limiting using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: login, registration and two-factor endpoints
//! - `api_rate_limiter`: everything else under `/api`
//!
//! Clients are keyed by the peer address from `ConnectInfo`. Forwarding
//! headers are only read when the peer is one of the configured trusted
//! proxies (`STOREFRONT_TRUSTED_PROXIES`); the client is then the rightmost
//! `X-Forwarded-For` hop that isn't a trusted proxy, or `X-Real-IP`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor for the client IP.
#[derive(Debug, Clone)]
pub struct ClientIpKeyExtractor {
    trusted_proxies: Arc<[IpAddr]>,
}

impl ClientIpKeyExtractor {
    /// Extractor that believes forwarding headers only from `trusted_proxies`.
    #[must_use]
    pub fn new(trusted_proxies: &[IpAddr]) -> Self {
        Self {
            trusted_proxies: trusted_proxies.into(),
        }
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.contains(&ip)
    }

    fn client_ip(&self, peer: IpAddr, headers: &HeaderMap) -> IpAddr {
        if !self.is_trusted(peer) {
            return peer;
        }

        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|list| {
                list.rsplit(',')
                    .map(|hop| hop.trim().parse::<IpAddr>().ok())
                    .take_while(Option::is_some)
                    .flatten()
                    .find(|ip| !self.is_trusted(*ip))
            });

        forwarded
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            })
            .unwrap_or(peer)
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let ConnectInfo(peer) = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .ok_or(GovernorError::UnableToExtractKey)?;
        Ok(self.client_ip(peer.ip(), req.headers()))
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(
    trusted_proxies: &[IpAddr],
    replenish_secs: u64,
    burst: u32,
) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trusted_proxies))
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Auth endpoints: one request every 6 seconds, burst of 5 (~10/min).
///
/// # Panics
///
/// Never in practice: the builder only rejects a zero period or burst.
#[must_use]
pub fn auth_rate_limiter(trusted_proxies: &[IpAddr]) -> RateLimiterLayer {
    limiter(trusted_proxies, 6, 5)
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid")
}

/// General API: one request per second, burst of 60.
///
/// # Panics
///
/// Never in practice: the builder only rejects a zero period or burst.
#[must_use]
pub fn api_rate_limiter(trusted_proxies: &[IpAddr]) -> RateLimiterLayer {
    limiter(trusted_proxies, 1, 60)
        .expect("rate limiter config with per_second(1) and burst_size(60) is valid")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    const PROXY: &str = "10.0.0.2";

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn request(peer: Option<&str>, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/api/auth/login");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(()).unwrap();
        if let Some(peer) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::new(ip(peer), 51234)));
        }
        req
    }

    fn behind_proxy() -> ClientIpKeyExtractor {
        ClientIpKeyExtractor::new(&[ip(PROXY)])
    }

    #[test]
    fn test_direct_clients_cannot_spoof_headers() {
        let req = request(
            Some("192.0.2.9"),
            &[("x-forwarded-for", "203.0.113.7"), ("x-real-ip", "198.51.100.4")],
        );
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip("192.0.2.9"));
        assert_eq!(
            ClientIpKeyExtractor::new(&[]).extract(&req).unwrap(),
            ip("192.0.2.9")
        );
    }

    #[test]
    fn test_trusted_proxy_uses_rightmost_untrusted_hop() {
        // The client prepended a fake hop; the proxy appended the real one.
        let req = request(
            Some(PROXY),
            &[("x-forwarded-for", "1.2.3.4, 203.0.113.7")],
        );
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip("203.0.113.7"));

        let req = request(
            Some(PROXY),
            &[("x-forwarded-for", "203.0.113.7, 10.0.0.2")],
        );
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip("203.0.113.7"));
    }

    #[test]
    fn test_trusted_proxy_real_ip_fallback() {
        let req = request(
            Some(PROXY),
            &[("x-forwarded-for", "garbage"), ("x-real-ip", "198.51.100.4")],
        );
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip("198.51.100.4"));

        let req = request(Some(PROXY), &[]);
        assert_eq!(behind_proxy().extract(&req).unwrap(), ip(PROXY));
    }

    #[test]
    fn test_no_peer_is_an_error() {
        let req = request(None, &[("x-forwarded-for", "203.0.113.7")]);
        assert!(behind_proxy().extract(&req).is_err());
    }

    #[test]
    fn test_limiters_build() {
        let _ = auth_rate_limiter(&[]);
        let _ = api_rate_limiter(&[ip(PROXY)]);
    }
}

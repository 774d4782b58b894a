//! Per-IP rate limits (governor via `tower_governor`).
//!
//! - [`auth_rate_limiter`]: sign-in and sign-up, about 10 per minute
//! - [`api_rate_limiter`]: cart, like, rating and comment posts, about 100 per minute
//!
//! Proxy headers are only read when `STOREFRONT_TRUST_PROXY_HEADERS` is set.
//! Without a proxy that overwrites them, any client could pick its own key.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client address, most trusted first.
/// `X-Forwarded-For` may hold a chain; its first hop is the client.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Keys requests by client IP.
///
/// With `trust_proxy_headers` set, proxy headers win over the socket peer.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub const fn new(trust_proxy_headers: bool) -> Self {
        Self { trust_proxy_headers }
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)?
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse()
            .ok()
    })
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if self.trust_proxy_headers
            && let Some(ip) = forwarded_ip(req.headers())
        {
            return Ok(ip);
        }

        // Needs `into_make_service_with_connect_info`
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Governor layer keyed by [`ClientIpKeyExtractor`].
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// One token every `replenish_secs`, at most `burst` at once.
///
/// # Panics
///
/// Panics if either value is zero. Callers pass constants.
#[allow(clippy::expect_used)]
fn limiter(replenish_secs: u64, burst: u32, trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy_headers))
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()
        .expect("non-zero rate limit settings");
    GovernorLayer::new(Arc::new(config))
}

/// Sign-in and sign-up: a token every 6 seconds, burst of 5.
#[must_use]
pub fn auth_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    limiter(6, 5, trust_proxy_headers)
}

/// Cart and engagement posts: a token per second, burst of 50.
#[must_use]
pub fn api_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    limiter(1, 50, trust_proxy_headers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/auth/login");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    const BEHIND_PROXY: ClientIpKeyExtractor = ClientIpKeyExtractor::new(true);
    const DIRECT: ClientIpKeyExtractor = ClientIpKeyExtractor::new(false);

    fn with_peer(mut req: Request<()>, peer: &str) -> Request<()> {
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let req = request(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.1"),
        ]);
        let ip = BEHIND_PROXY.extract(&req).ok();
        assert_eq!(ip, "203.0.113.7".parse().ok());
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request(&[("x-forwarded-for", "198.51.100.1, 10.0.0.1")]);
        let ip = BEHIND_PROXY.extract(&req).ok();
        assert_eq!(ip, "198.51.100.1".parse().ok());
    }

    #[test]
    fn test_unparseable_header_falls_through() {
        let req = request(&[("cf-connecting-ip", "unknown"), ("x-real-ip", "198.51.100.4")]);
        let ip = BEHIND_PROXY.extract(&req).ok();
        assert_eq!(ip, "198.51.100.4".parse().ok());
    }

    #[test]
    fn test_connect_info_fallback() {
        let req = request(&[]);
        assert!(BEHIND_PROXY.extract(&req).is_err());

        let req = with_peer(req, "192.0.2.9:51000");
        let ip = BEHIND_PROXY.extract(&req).ok();
        assert_eq!(ip, "192.0.2.9".parse().ok());
    }

    #[test]
    fn test_direct_deployment_ignores_client_headers() {
        let req = with_peer(
            request(&[
                ("cf-connecting-ip", "203.0.113.7"),
                ("x-forwarded-for", "198.51.100.1"),
                ("x-real-ip", "198.51.100.4"),
            ]),
            "192.0.2.9:51000",
        );
        let ip = DIRECT.extract(&req).ok();
        assert_eq!(ip, "192.0.2.9".parse().ok());
    }

    #[test]
    fn test_rotating_forwarded_for_keeps_one_key() {
        let first = with_peer(request(&[("x-forwarded-for", "198.51.100.1")]), "192.0.2.9:51000");
        let second = with_peer(request(&[("x-forwarded-for", "198.51.100.2")]), "192.0.2.9:51001");
        assert_eq!(DIRECT.extract(&first).ok(), DIRECT.extract(&second).ok());
    }

    #[test]
    fn test_direct_deployment_without_peer_is_an_error() {
        let req = request(&[("x-forwarded-for", "198.51.100.1")]);
        assert!(DIRECT.extract(&req).is_err());
    }
}

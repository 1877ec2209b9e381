//! Rate limiting using governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: login and registration (~10/min per IP)
//! - `cart_rate_limiter`: cart mutations and image preloading (~100/min per IP)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client IP, most trusted first.
const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

/// Key extractor reading the client IP from proxy headers, falling back to
/// the peer address.
///
/// For `X-Forwarded-For` the first address in the chain is used. The peer
/// fallback needs the server to be started with connect info.
#[derive(Clone, Copy)]
pub struct ProxyIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ProxyIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();
        CLIENT_IP_HEADERS
            .iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|v| v.to_str().ok())
            .find_map(|s| s.split(',').next().and_then(|ip| ip.trim().parse().ok()))
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ProxyIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Auth endpoints: 1 token every 6 seconds, burst of 5.
///
/// # Panics
///
/// Never: the period and burst size are nonzero constants.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("auth rate limiter config is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Cart and image endpoints: 1 token per second, burst of 50.
///
/// # Panics
///
/// Never: the period and burst size are nonzero constants.
#[must_use]
pub fn cart_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ProxyIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("cart rate limiter config is valid");
    GovernorLayer::new(Arc::new(config))
}

//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Provides rate limiters for the two endpoint categories:
//! - `auth_rate_limiter`: Strict limits for register/login (~10/min, burst 5)
//! - `api_rate_limiter`: Public weather, forecast and GraphQL (~10/min, burst 10)
//!
//! Both key on the socket peer unless `TRUST_PROXY_HEADERS` is set.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use axum::response::IntoResponse;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::error::AppError;

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Key extractor for the client address.
///
/// With `trust_proxy_headers` off, only the `ConnectInfo` address set by
/// `into_make_service_with_connect_info` is used, so a client cannot pick its
/// own key. Turn it on only behind a proxy that overwrites these headers.
/// Order when on: `CF-Connecting-IP`, first `X-Forwarded-For` entry,
/// `X-Real-IP`, then the peer address.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub const fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }

    fn from_headers(headers: &HeaderMap) -> Option<IpAddr> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        header("cf-connecting-ip")
            .and_then(|s| s.trim().parse().ok())
            .or_else(|| {
                header("x-forwarded-for")
                    .and_then(|s| s.split(',').next())
                    .and_then(|s| s.trim().parse().ok())
            })
            .or_else(|| header("x-real-ip").and_then(|s| s.trim().parse().ok()))
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let forwarded = self
            .trust_proxy_headers
            .then(|| Self::from_headers(req.headers()))
            .flatten();

        forwarded
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Render governor rejections with the standard JSON error body.
fn rejection_response(error: GovernorError) -> axum::response::Response {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::warn!(wait_time, "Rate limit exceeded");
            let mut response = AppError::RateLimited.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::BadRequest("Unable to determine client address".to_string()).into_response()
        }
        GovernorError::Other { msg, .. } => {
            AppError::Internal(msg.unwrap_or_else(|| "rate limiter error".to_string()))
                .into_response()
        }
    }
}

fn rate_limiter(replenish_secs: u64, burst: u32, trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy_headers))
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()
        .expect("rate limiter config with positive period and burst is valid");
    GovernorLayer::new(Arc::new(config)).error_handler(rejection_response)
}

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Panics
///
/// This function will not panic. `per_second(6)` and `burst_size(5)` are
/// always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn auth_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    rate_limiter(6, 5, trust_proxy_headers)
}

/// Create rate limiter for public endpoints: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 10.
///
/// # Panics
///
/// This function will not panic. `per_second(6)` and `burst_size(10)` are
/// always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn api_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    rate_limiter(6, 10, trust_proxy_headers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/weather/paris");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    fn with_peer(mut req: Request<()>, peer: &str) -> Request<()> {
        let peer: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        req
    }

    const TRUSTED: ClientIpKeyExtractor = ClientIpKeyExtractor::new(true);
    const UNTRUSTED: ClientIpKeyExtractor = ClientIpKeyExtractor::new(false);

    #[test]
    fn test_prefers_cloudflare_header() {
        let req = request(&[
            ("cf-connecting-ip", "203.0.113.9"),
            ("x-forwarded-for", "198.51.100.1"),
        ]);
        let ip = TRUSTED.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.9");
    }

    #[test]
    fn test_first_forwarded_for_entry() {
        let req = request(&[("x-forwarded-for", "198.51.100.1, 10.0.0.1")]);
        let ip = TRUSTED.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "198.51.100.1");
    }

    #[test]
    fn test_trusted_garbage_header_falls_back_to_peer() {
        let req = with_peer(request(&[("x-forwarded-for", "nope")]), "192.0.2.7:51000");
        assert_eq!(TRUSTED.extract(&req).unwrap().to_string(), "192.0.2.7");
    }

    #[test]
    fn test_untrusted_ignores_proxy_headers() {
        let req = with_peer(
            request(&[
                ("cf-connecting-ip", "203.0.113.9"),
                ("x-forwarded-for", "198.51.100.1"),
                ("x-real-ip", "198.51.100.2"),
            ]),
            "192.0.2.7:51000",
        );
        assert_eq!(UNTRUSTED.extract(&req).unwrap().to_string(), "192.0.2.7");
    }

    #[test]
    fn test_untrusted_is_the_default() {
        let req = with_peer(request(&[("x-real-ip", "198.51.100.2")]), "192.0.2.7:51000");
        let ip = ClientIpKeyExtractor::default().extract(&req).unwrap();
        assert_eq!(ip.to_string(), "192.0.2.7");
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let req = with_peer(request(&[]), "192.0.2.7:51000");
        assert_eq!(UNTRUSTED.extract(&req).unwrap().to_string(), "192.0.2.7");
    }

    #[test]
    fn test_no_source_is_an_error() {
        assert!(UNTRUSTED.extract(&request(&[])).is_err());
        let spoofed = request(&[("x-forwarded-for", "198.51.100.1")]);
        assert!(UNTRUSTED.extract(&spoofed).is_err());
    }

    #[test]
    fn test_too_many_requests_renders_json_429() {
        let response = rejection_response(GovernorError::TooManyRequests {
            wait_time: 3,
            headers: None,
        });
        assert_eq!(response.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
    }
}

//! # Rate Limiting
//!
//! Fixed-window admission per `(zone, client)` backed by the shared cache's
//! atomic counter. The first request from a client opens a 60-second window;
//! the first `N` requests in it are admitted, later ones are rejected with
//! `429` and a `Retry-After` equal to the time left in the window.
//!
//! Every gated response carries `X-RateLimit-<ZONE>-Remaining`. When the
//! cache backend is unavailable the gate fails open: the request proceeds
//! unthrottled and the failure is logged.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use warden_core::ErrorKind;
use warden_store::{CacheBackend, CacheError};

use crate::error::AppError;

/// Length of one admission window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub admitted: bool,
    /// Admissions left in the current window.
    pub remaining: u64,
    /// Time until the window resets.
    pub retry_after: Duration,
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn CacheBackend>,
    trusted_proxies: Arc<[IpAddr]>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("trusted_proxies", &self.trusted_proxies)
            .finish_non_exhaustive()
    }
}

pub fn counter_key(zone: &str, client: &str) -> String {
    format!("api:rate_limit:{zone}:{client}")
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn CacheBackend>) -> Self {
        Self {
            cache,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }

    /// Peers allowed to name the client through forwarding headers.
    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = Arc::from(proxies);
        self
    }

    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.trusted_proxies
    }

    /// Count one request from `client` in `zone` against `per_minute`.
    pub async fn allow(
        &self,
        zone: &str,
        client: &str,
        per_minute: u64,
    ) -> Result<RateDecision, CacheError> {
        let counter = self
            .cache
            .incr_with_expiry(&counter_key(zone, client), RATE_WINDOW)
            .await?;

        let admitted = counter.count <= per_minute;
        Ok(RateDecision {
            admitted,
            remaining: per_minute.saturating_sub(counter.count),
            retry_after: counter.ttl,
        })
    }
}

/// A named quota applied to a group of routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitGate {
    zone: String,
    per_minute: u64,
}

impl RateLimitGate {
    /// Zone names are uppercased; they appear in keys and header names.
    pub fn new(zone: &str, per_minute: u64) -> Self {
        Self {
            zone: zone.to_uppercase(),
            per_minute,
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn per_minute(&self) -> u64 {
        self.per_minute
    }

    fn remaining_header(&self) -> Option<HeaderName> {
        HeaderName::from_bytes(format!("x-ratelimit-{}-remaining", self.zone).as_bytes()).ok()
    }
}

/// Identify the client by its peer address, or `"unknown"` without one.
///
/// When the peer is one of `trusted` proxies, the first `X-Forwarded-For`
/// entry and then `X-Real-IP` take precedence over it.
pub fn client_identifier(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted: &[IpAddr],
) -> String {
    let peer_ip = peer.map(|addr| addr.ip());
    if !peer_ip.is_some_and(|ip| trusted.contains(&ip)) {
        return peer_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Seconds for `Retry-After`, rounded up and never zero.
fn retry_after_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

/// Middleware enforcing a [`RateLimitGate`].
pub async fn rate_limit_middleware(
    State((limiter, gate)): State<(RateLimiter, RateLimitGate)>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_identifier(request.headers(), peer, limiter.trusted_proxies());

    let decision = match limiter.allow(gate.zone(), &client, gate.per_minute()).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(
                zone = %gate.zone(),
                client = %client,
                error = %e,
                "rate limiter unavailable, admitting request"
            );
            return next.run(request).await;
        }
    };

    let mut response = if decision.admitted {
        next.run(request).await
    } else {
        tracing::warn!(zone = %gate.zone(), client = %client, "rate limit exceeded");
        let mut rejected = AppError::new(ErrorKind::TooManyRequests)
            .append(format!("{} quota of {} per minute exhausted", gate.zone(), gate.per_minute()))
            .into_response();
        rejected.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(retry_after_secs(decision.retry_after)),
        );
        rejected
    };

    if let Some(name) = gate.remaining_header() {
        response
            .headers_mut()
            .insert(name, HeaderValue::from(decision.remaining));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FailingCache;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;
    use warden_core::ManualClock;
    use warden_store::MemoryCache;

    fn limiter() -> (RateLimiter, ManualClock) {
        let clock = ManualClock::starting_now();
        let cache = MemoryCache::new(Arc::new(clock.clone()));
        (RateLimiter::new(Arc::new(cache)), clock)
    }

    fn gated_app(limiter: RateLimiter, per_minute: u64) -> Router {
        Router::new()
            .route("/gated", get(|| async { "ok" }))
            .layer(from_fn_with_state(
                (limiter, RateLimitGate::new("global", per_minute)),
                rate_limit_middleware,
            ))
    }

    fn request(client: &str) -> axum::http::Request<Body> {
        let peer: SocketAddr = format!("{client}:40000").parse().unwrap();
        let mut request = axum::http::Request::builder()
            .uri("/gated")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    fn forwarded(peer: &str, forwarded_for: &str) -> axum::http::Request<Body> {
        let mut request = request(peer);
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_str(forwarded_for).unwrap(),
        );
        request
    }

    #[tokio::test]
    async fn admits_quota_then_rejects() {
        let (limiter, _) = limiter();
        for expected_remaining in (0..5).rev() {
            let decision = limiter.allow("GLOBAL", "10.0.0.1", 5).await.unwrap();
            assert!(decision.admitted);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let decision = limiter.allow("GLOBAL", "10.0.0.1", 5).await.unwrap();
        assert!(!decision.admitted);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.retry_after, RATE_WINDOW);
    }

    #[tokio::test]
    async fn window_reset_admits_again() {
        let (limiter, clock) = limiter();
        for _ in 0..3 {
            limiter.allow("GLOBAL", "c", 2).await.unwrap();
        }
        clock.advance(Duration::from_secs(45));
        let blocked = limiter.allow("GLOBAL", "c", 2).await.unwrap();
        assert!(!blocked.admitted);
        assert_eq!(blocked.retry_after, Duration::from_secs(15));

        clock.advance(Duration::from_secs(15));
        assert!(limiter.allow("GLOBAL", "c", 2).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn zones_and_clients_are_independent() {
        let (limiter, _) = limiter();
        assert!(limiter.allow("LOGIN", "a", 1).await.unwrap().admitted);
        assert!(!limiter.allow("LOGIN", "a", 1).await.unwrap().admitted);
        assert!(limiter.allow("LOGIN", "b", 1).await.unwrap().admitted);
        assert!(limiter.allow("GLOBAL", "a", 1).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn middleware_sets_remaining_header() {
        let (limiter, _) = limiter();
        let app = gated_app(limiter, 3);
        let response = app.oneshot(request("1.2.3.4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-global-remaining"], "2");
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[tokio::test]
    async fn middleware_rejects_with_retry_after() {
        let (limiter, _) = limiter();
        let app = gated_app(limiter, 1);
        app.clone().oneshot(request("1.2.3.4")).await.unwrap();

        let response = app.oneshot(request("1.2.3.4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
        assert_eq!(response.headers()["x-ratelimit-global-remaining"], "0");
    }

    #[tokio::test]
    async fn middleware_fails_open() {
        let app = gated_app(RateLimiter::new(Arc::new(FailingCache)), 1);
        for _ in 0..3 {
            let response = app.clone().oneshot(request("1.2.3.4")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get("x-ratelimit-global-remaining").is_none());
        }
    }

    #[test]
    fn client_identifier_precedence_behind_trusted_proxy() {
        let peer: SocketAddr = "192.168.1.9:5555".parse().unwrap();
        let trusted = [peer.ip()];
        let mut headers = HeaderMap::new();
        assert_eq!(client_identifier(&headers, None, &trusted), "unknown");
        assert_eq!(client_identifier(&headers, Some(peer), &trusted), "192.168.1.9");

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_identifier(&headers, Some(peer), &trusted), "10.0.0.2");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_identifier(&headers, Some(peer), &trusted), "203.0.113.7");
    }

    #[test]
    fn forwarding_headers_ignored_from_untrusted_peer() {
        let peer: SocketAddr = "198.51.100.4:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));

        assert_eq!(client_identifier(&headers, Some(peer), &[]), "198.51.100.4");
        let other: IpAddr = "192.168.1.9".parse().unwrap();
        assert_eq!(client_identifier(&headers, Some(peer), &[other]), "198.51.100.4");
        assert_eq!(client_identifier(&headers, None, &[other]), "unknown");
    }

    #[tokio::test]
    async fn spoofed_forwarded_for_does_not_reset_quota() {
        let (limiter, _) = limiter();
        let app = gated_app(limiter, 1);
        let first = app.clone().oneshot(forwarded("198.51.100.4", "1.1.1.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(forwarded("198.51.100.4", "2.2.2.2")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn trusted_proxy_forwards_distinct_clients() {
        let (limiter, _) = limiter();
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let app = gated_app(limiter.with_trusted_proxies(vec![proxy]), 1);
        let first = app.clone().oneshot(forwarded("10.0.0.1", "1.1.1.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(forwarded("10.0.0.1", "2.2.2.2")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
    }

    #[test]
    fn key_and_zone_format() {
        let gate = RateLimitGate::new("login", 10);
        assert_eq!(gate.zone(), "LOGIN");
        assert_eq!(counter_key(gate.zone(), "1.2.3.4"), "api:rate_limit:LOGIN:1.2.3.4");
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(60)), 60);
    }
}

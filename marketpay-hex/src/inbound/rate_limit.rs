//! Per-caller request throttling.
//!
//! Token buckets keyed by API key (Governor), so one client hammering
//! the charge endpoint cannot starve the others. The gateway webhook is
//! exempt: the acquirer retries on anything but 200, and throttling it
//! would only amplify the retry storm.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde_json::json;
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type KeyedLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared limiter state: one token bucket per API key, created lazily.
pub struct RateLimiterState {
    limiters: DashMap<String, Arc<KeyedLimiter>>,
    quota: Quota,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// Allows `requests` per `period` for each distinct key.
    pub fn new(requests: u32, period: Duration) -> Self {
        let quota = Quota::with_period(period)
            .unwrap()
            .allow_burst(NonZeroU32::new(requests).unwrap());

        Self {
            limiters: DashMap::new(),
            quota,
        }
    }

    /// Takes one token from the key's bucket. `false` means throttled.
    pub fn check(&self, key: &str) -> bool {
        let limiter = self
            .limiters
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)));

        limiter.check().is_ok()
    }
}

/// The bucket key: the bearer API key when present, a shared anonymous
/// bucket otherwise (pre-auth traffic such as bootstrap).
fn bucket_key(request: &Request<Body>) -> String {
    request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Rate limiting middleware. Runs before auth, so throttled requests
/// never cost a key lookup.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path == "/health" || path == "/api/payments/webhook/gateway" {
        return next.run(request).await;
    }

    if !limiter.check(&bucket_key(&request)) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "retry_after_seconds": 60
            })),
        )
            .into_response();
    }

    next.run(request).await
}

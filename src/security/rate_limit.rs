//! Fixed-window rate limiting per client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::http::request::peer_addr;
use crate::observability::metrics;
use crate::routing::PathPrefixMatcher;
use crate::security::headers::X_FORWARDED_FOR;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Per-client counter for the current window.
#[derive(Debug, Clone, Copy)]
struct RateBucket {
    window_start: Instant,
    count: u32,
}

/// Decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Rejected { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, RateBucket>,
    max_requests: u32,
    window: Duration,
    prefixes: Vec<PathPrefixMatcher>,
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            max_requests,
            window,
            prefixes: vec![PathPrefixMatcher::new("/")],
            trust_forwarded_for: false,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            prefixes: config
                .path_prefixes
                .iter()
                .map(|p| PathPrefixMatcher::new(p.as_str()))
                .collect(),
            trust_forwarded_for: config.trust_forwarded_for,
            ..Self::new(config.max_requests, config.window())
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Whether requests to `path` are counted at all.
    pub fn applies_to(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| p.matches(path))
    }

    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Count one request from `key` at time `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Admission {
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(RateBucket {
            window_start: now,
            count: 0,
        });

        let mut elapsed = now.saturating_duration_since(bucket.window_start);
        if elapsed >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
            elapsed = Duration::ZERO;
        }

        bucket.count = bucket.count.saturating_add(1);
        if bucket.count > self.max_requests {
            Admission::Rejected {
                retry_after: self.window - elapsed,
            }
        } else {
            Admission::Allowed {
                remaining: self.max_requests - bucket.count,
            }
        }
    }

    /// Drop buckets whose window ended more than one full window before `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        let stale_after = self.window.saturating_mul(2);
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.window_start) < stale_after);
        before.saturating_sub(self.buckets.len())
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Evict stale buckets once per window until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let start = tokio::time::Instant::now() + self.window;
        let mut ticker = tokio::time::interval_at(start, self.window);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_at(Instant::now());
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.bucket_count(), "Evicted stale rate-limit buckets");
                    }
                    metrics::record_rate_buckets(self.bucket_count());
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate-limit sweeper stopping");
                    break;
                }
            }
        }
    }

    /// Identify the client behind a request.
    fn client_key(&self, request: &Request<Body>) -> String {
        if self.trust_forwarded_for {
            let first_hop = request
                .headers()
                .get(&X_FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(hop) = first_hop {
                return hop.to_string();
            }
        }

        peer_addr(request)
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Admit or reject before routing. Rejection short-circuits with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.applies_to(request.uri().path()) {
        return next.run(request).await;
    }

    let key = limiter.client_key(&request);
    match limiter.check(&key) {
        Admission::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limiter.max_requests()));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Admission::Rejected { retry_after } => {
            tracing::warn!(client = %key, retry_after_ms = retry_after.as_millis() as u64, "Rate limit exceeded");
            metrics::record_rate_limited();
            GatewayError::RateLimitExceeded { retry_after }.into_response()
        }
    }
}

//! Fixed-window rate limiting keyed by client IP.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use gophersocial_common::{AppError, config::RateLimiterConfig};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::extractors::ClientIp;
use crate::middleware::AppState;

/// Counter for one key's current window.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

/// Fixed-window limiter.
///
/// Windows start at a key's first request and do not slide, so up to twice
/// the limit can pass around a window boundary.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    states: Arc<RwLock<HashMap<String, WindowState>>>,
    max_requests: u32,
    window: Duration,
    enabled: bool,
}

/// Admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    /// Denied until the current window closes.
    Limited { retry_after: Duration },
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
            enabled: true,
        }
    }

    #[must_use]
    pub fn from_config(config: &RateLimiterConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.requests_per_window, config.window())
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Count a request for `key` and decide whether it is admitted.
    pub async fn check(&self, key: &str) -> RateLimitResult {
        let mut states = self.states.write().await;
        let now = Instant::now();

        let state = states.entry(key.to_string()).or_insert(WindowState {
            count: 0,
            window_start: now,
        });

        if now.duration_since(state.window_start) >= self.window {
            state.count = 0;
            state.window_start = now;
        }

        state.count = state.count.saturating_add(1);
        if state.count > self.max_requests {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(state.window_start));
            return RateLimitResult::Limited { retry_after };
        }

        RateLimitResult::Allowed
    }

    /// Drop keys whose window has closed.
    pub async fn cleanup(&self) {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let window = self.window;

        states.retain(|_, state| now.duration_since(state.window_start) < window);
    }

    /// Number of tracked keys.
    pub async fn key_count(&self) -> usize {
        self.states.read().await.len()
    }
}

/// Whole seconds until `remaining` elapses, rounded up.
fn retry_after_secs(remaining: Duration) -> u64 {
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}

/// Rate limiting middleware. A pass-through when the limiter is disabled.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.rate_limiter.is_enabled() {
        return next.run(req).await;
    }

    let key = ip.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
    match state.rate_limiter.check(&key).await {
        RateLimitResult::Allowed => next.run(req).await,
        RateLimitResult::Limited { retry_after } => {
            debug!(client = %key, "Rate limit exceeded");
            AppError::RateLimited {
                retry_after: retry_after_secs(retry_after),
            }
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_limit() {
        let limiter = FixedWindowLimiter::new(3, Duration::from_secs(5));

        for _ in 0..3 {
            assert_eq!(limiter.check("10.0.0.1").await, RateLimitResult::Allowed);
        }
        assert!(matches!(
            limiter.check("10.0.0.1").await,
            RateLimitResult::Limited { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_window_remainder() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(5));
        limiter.check("ip").await;

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(
            limiter.check("ip").await,
            RateLimitResult::Limited {
                retry_after: Duration::from_secs(3)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(5));
        limiter.check("ip").await;
        assert!(matches!(
            limiter.check("ip").await,
            RateLimitResult::Limited { .. }
        ));

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(limiter.check("ip").await, RateLimitResult::Allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_keys() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(5));
        limiter.check("a").await;

        assert_eq!(limiter.check("b").await, RateLimitResult::Allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_drops_closed_windows() {
        let limiter = FixedWindowLimiter::new(10, Duration::from_secs(5));
        limiter.check("old").await;
        tokio::time::advance(Duration::from_secs(6)).await;
        limiter.check("new").await;

        limiter.cleanup().await;

        assert_eq!(limiter.key_count().await, 1);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(2_001)), 3);
        assert_eq!(retry_after_secs(Duration::from_secs(2)), 2);
    }

    #[test]
    fn test_from_config() {
        let limiter = FixedWindowLimiter::from_config(&RateLimiterConfig {
            requests_per_window: 20,
            window_secs: 5,
            enabled: false,
        });
        assert!(!limiter.is_enabled());
        assert_eq!(limiter.window, Duration::from_secs(5));
    }
}

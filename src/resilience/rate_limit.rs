use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Fixed window limits
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15 * 60),
            max_requests: 5,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Too many requests from {client}, please try again after {}s", .retry_after.as_secs())]
pub struct RateLimitExceeded {
    pub client: String,
    pub retry_after: Duration,
}

/// Outcome of an admitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    count: u32,
    window_start: Instant,
}

impl RateLimitWindow {
    fn open(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) > window
    }
}

/// Fixed window request counter keyed by client identity.
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, RateLimitWindow>>,
    config: RateLimitConfig,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn allow(&self, client: &str) -> bool {
        self.check(client).is_ok()
    }

    /// Count one request from `client` against its current window.
    pub fn check(&self, client: &str) -> Result<RateLimitDecision, RateLimitExceeded> {
        let now = Instant::now();
        let mut windows = self.lock();

        let window = windows
            .entry(client.to_string())
            .and_modify(|w| {
                if w.is_expired(now, self.config.window) {
                    debug!("Rate limit window expired for {}, starting a new one", client);
                    *w = RateLimitWindow::open(now);
                } else {
                    w.count = w.count.saturating_add(1);
                }
            })
            .or_insert_with(|| RateLimitWindow::open(now));

        let reset_after = self
            .config
            .window
            .saturating_sub(now.duration_since(window.window_start));

        if window.count > self.config.max_requests {
            warn!(client = %client, count = window.count, "Rate limit exceeded");
            return Err(RateLimitExceeded {
                client: client.to_string(),
                retry_after: reset_after,
            });
        }

        Ok(RateLimitDecision {
            limit: self.config.max_requests,
            remaining: self.config.max_requests - window.count,
            reset_after,
        })
    }

    /// Drop windows that have expired; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, w| !w.is_expired(now, self.config.window));
        let purged = before - windows.len();
        if purged > 0 {
            debug!("Purged {} expired rate limit windows", purged);
        }
        purged
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn limiter(max_requests: u32, window_ms: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimitConfig {
            window: Duration::from_millis(window_ms),
            max_requests,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_sixth_request_in_window_is_rejected() {
        let limiter = limiter(5, 60_000);
        for expected_remaining in (0..5).rev() {
            let decision = limiter.check("10.0.0.1").unwrap();
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.limit, 5);
        }

        let err = limiter.check("10.0.0.1").unwrap_err();
        assert_eq!(err.client, "10.0.0.1");
        assert_eq!(err.retry_after, Duration::from_millis(60_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_window_after_expiry_allows_again() {
        let limiter = limiter(5, 1000);
        for _ in 0..7 {
            limiter.allow("10.0.0.1");
        }
        assert!(!limiter.allow("10.0.0.1"));

        // Exactly at the boundary the old window still applies
        advance(Duration::from_millis(1000)).await;
        assert!(!limiter.allow("10.0.0.1"));

        advance(Duration::from_millis(1)).await;
        let decision = limiter.check("10.0.0.1").unwrap();
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.reset_after, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_are_per_client() {
        let limiter = limiter(1, 60_000);
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_after_counts_down_within_window() {
        let limiter = limiter(5, 10_000);
        limiter.check("client").unwrap();
        advance(Duration::from_millis(4000)).await;
        let decision = limiter.check("client").unwrap();
        assert_eq!(decision.reset_after, Duration::from_millis(6000));
        assert_eq!(decision.remaining, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keeps_live_windows() {
        let limiter = limiter(5, 1000);
        limiter.allow("old");
        advance(Duration::from_millis(600)).await;
        limiter.allow("fresh");
        advance(Duration::from_millis(500)).await;

        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.check("fresh").is_ok());
    }

    #[test]
    fn test_default_config() {
        let limiter = FixedWindowLimiter::default();
        assert_eq!(limiter.config().window, Duration::from_secs(900));
        assert_eq!(limiter.config().max_requests, 5);
    }
}

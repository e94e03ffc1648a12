use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use poem::Request;
use poem_openapi::{payload::Json, ApiResponse, Object, OpenApi};
use tokio::time::Instant;

use crate::api::{client_key, timestamp};
use crate::error::ResilienceError;
use crate::resilience::{FixedWindowLimiter, ResilienceMetrics};

pub struct RateLimitApi {
    limiter: Arc<FixedWindowLimiter>,
    metrics: Arc<ResilienceMetrics>,
}

impl RateLimitApi {
    pub fn new(limiter: Arc<FixedWindowLimiter>, metrics: Arc<ResilienceMetrics>) -> Self {
        Self { limiter, metrics }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct RateLimitReply {
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct RateLimitFailure {
    pub error: String,
    pub retry_after_secs: u64,
}

#[derive(ApiResponse)]
pub enum RateLimitResponse {
    #[oai(status = 200)]
    Ok(
        Json<RateLimitReply>,
        #[oai(header = "X-RateLimit-Limit")] u32,
        #[oai(header = "X-RateLimit-Remaining")] u32,
        #[oai(header = "X-RateLimit-Reset")] u64,
    ),

    #[oai(status = 429)]
    TooManyRequests(Json<RateLimitFailure>, #[oai(header = "Retry-After")] u64),
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// "15 minutes", "1 minute", "30 seconds"
fn describe_window(window: Duration) -> String {
    let secs = ceil_secs(window);
    let (amount, unit) = if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if amount == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", amount, unit)
    }
}

#[OpenApi]
impl RateLimitApi {
    /// Only this endpoint is rate limited, per client address
    #[oai(path = "/rate-limit", method = "get")]
    async fn rate_limited(&self, req: &Request) -> RateLimitResponse {
        let client = client_key(req);
        let start = Instant::now();
        let result = self
            .limiter
            .check(&client)
            .map_err(ResilienceError::<Infallible>::from);
        self.metrics.record(&result, start.elapsed());

        match result {
            Ok(decision) => {
                let config = self.limiter.config();
                RateLimitResponse::Ok(
                    Json(RateLimitReply {
                        message: format!(
                            "This endpoint is rate limited. Try refreshing more than {} times in {}.",
                            config.max_requests,
                            describe_window(config.window)
                        ),
                        timestamp: timestamp(),
                    }),
                    decision.limit,
                    decision.remaining,
                    ceil_secs(decision.reset_after),
                )
            }
            Err(err) => {
                let retry_after_secs = ceil_secs(err.retry_after().unwrap_or_default());
                RateLimitResponse::TooManyRequests(
                    Json(RateLimitFailure {
                        error: err.to_string(),
                        retry_after_secs,
                    }),
                    retry_after_secs,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::RateLimitConfig;

    fn api(max_requests: u32) -> (RateLimitApi, Arc<ResilienceMetrics>) {
        api_with_window(max_requests, Duration::from_secs(15 * 60))
    }

    fn api_with_window(max_requests: u32, window: Duration) -> (RateLimitApi, Arc<ResilienceMetrics>) {
        let limiter = Arc::new(FixedWindowLimiter::new(RateLimitConfig { window, max_requests }));
        let metrics = Arc::new(ResilienceMetrics::new());
        (RateLimitApi::new(limiter, Arc::clone(&metrics)), metrics)
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(1000)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(1001)), 2);
        assert_eq!(ceil_secs(Duration::ZERO), 0);
    }

    #[test]
    fn test_describe_window() {
        assert_eq!(describe_window(Duration::from_secs(15 * 60)), "15 minutes");
        assert_eq!(describe_window(Duration::from_secs(60)), "1 minute");
        assert_eq!(describe_window(Duration::from_secs(30)), "30 seconds");
        assert_eq!(describe_window(Duration::from_secs(90)), "90 seconds");
        assert_eq!(describe_window(Duration::from_millis(1500)), "2 seconds");
    }

    #[tokio::test]
    async fn test_short_window_message_is_not_zero_minutes() {
        let (api, _) = api_with_window(5, Duration::from_secs(30));
        let req = Request::builder().finish();
        match api.rate_limited(&req).await {
            RateLimitResponse::Ok(Json(body), ..) => {
                assert!(body.message.contains("more than 5 times in 30 seconds"));
            }
            _ => panic!("Expected Ok response"),
        }
    }

    #[tokio::test]
    async fn test_sixth_request_gets_429() {
        let (api, metrics) = api(5);
        let req = Request::builder().finish();

        for expected_remaining in (0..5).rev() {
            match api.rate_limited(&req).await {
                RateLimitResponse::Ok(Json(body), limit, remaining, reset) => {
                    assert!(body.message.contains("more than 5 times in 15 minutes"));
                    assert_eq!(limit, 5);
                    assert_eq!(remaining, expected_remaining);
                    assert!(reset <= 900);
                }
                _ => panic!("Expected Ok response"),
            }
        }

        match api.rate_limited(&req).await {
            RateLimitResponse::TooManyRequests(Json(body), retry_after) => {
                assert!(body.error.starts_with("Too many requests from unknown"));
                assert_eq!(body.retry_after_secs, retry_after);
                assert!(retry_after > 0 && retry_after <= 900);
            }
            _ => panic!("Expected TooManyRequests response"),
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rate_limited, 1);
        assert_eq!(snapshot.total_calls, 6);
        assert_eq!(snapshot.successful_calls, 5);
        assert_eq!(snapshot.failed_calls, 1);
    }
}

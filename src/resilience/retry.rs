use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, first call included
    pub max_retries: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// A `max_retries` of zero is treated as a single attempt.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            delay,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Retry `operation` until it succeeds or the policy's attempts are used up.
///
/// Every failure is retried the same way; the last one is returned verbatim.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_notify(policy, operation, |_, _| {}).await
}

/// Same as [`with_retry`], calling `notify(attempt, &error)` after each failed attempt.
pub async fn with_retry_notify<F, Fut, T, E, N>(
    policy: &RetryPolicy,
    mut operation: F,
    mut notify: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    N: FnMut(u32, &E),
{
    let max_retries = policy.attempts();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return Ok(result);
            }
            Err(err) => {
                attempt += 1;
                notify(attempt, &err);

                if attempt >= max_retries {
                    warn!("Final attempt ({}) failed: {}", attempt, err);
                    return Err(err);
                }

                warn!(
                    "Retry attempt {}/{} failed, waiting {}ms: {}",
                    attempt,
                    max_retries,
                    policy.delay.as_millis(),
                    err
                );
                sleep(policy.delay).await;
            }
        }
    }
}

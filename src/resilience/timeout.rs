use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::error::ResilienceError;

/// Deadline applied to one operation, labelled for diagnostics.
#[derive(Debug, Clone)]
pub struct TimeoutGuard {
    limit: Duration,
    label: String,
}

impl TimeoutGuard {
    pub fn new(limit: Duration, label: impl Into<String>) -> Self {
        Self {
            limit,
            label: label.into(),
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Race `operation` against the deadline.
    ///
    /// Whichever side finishes first decides the outcome and the other side is
    /// dropped before returning: the timer can never fire afterwards, and a
    /// timed-out operation is abandoned at its current suspension point.
    pub async fn run<Fut, T, E>(&self, operation: Fut) -> Result<T, ResilienceError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        debug!("[{}] Starting with timeout {}ms", self.label, self.limit.as_millis());
        let start = Instant::now();

        let timer = sleep(self.limit);
        tokio::pin!(timer);
        tokio::pin!(operation);

        tokio::select! {
            biased;

            outcome = &mut operation => {
                let elapsed = start.elapsed();
                match outcome {
                    Ok(value) => {
                        info!("[{}] Completed in {}ms", self.label, elapsed.as_millis());
                        Ok(value)
                    }
                    Err(err) => {
                        warn!("[{}] Failed after {}ms: {}", self.label, elapsed.as_millis(), err);
                        Err(ResilienceError::Operation(err))
                    }
                }
            }
            _ = &mut timer => {
                let elapsed = start.elapsed();
                error!(
                    "[{}] Timeout after {}ms ({}ms limit)",
                    self.label,
                    elapsed.as_millis(),
                    self.limit.as_millis()
                );
                Err(ResilienceError::Timeout {
                    elapsed,
                    limit: self.limit,
                })
            }
        }
    }
}

/// Run `operation` with a deadline of `limit`.
pub async fn with_timeout<Fut, T, E>(
    operation: Fut,
    limit: Duration,
    label: &str,
) -> Result<T, ResilienceError<E>>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    TimeoutGuard::new(limit, label).run(operation).await
}

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ResilienceError;

const NO_FAILURE: u64 = u64::MAX;

/// How callers arriving after the reset timeout are admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrialAdmission {
    /// Every caller arriving after the reset timeout closes the circuit and
    /// goes through, so concurrent callers may all probe the dependency.
    #[default]
    Concurrent,
    /// Exactly one caller probes; the circuit stays open for everyone else
    /// until that probe resolves.
    Single,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open after the last failure
    pub reset_timeout: Duration,
    pub trial_admission: TrialAdmission,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            reset_timeout: Duration::from_millis(5000),
            trial_admission: TrialAdmission::Concurrent,
        }
    }
}

/// Point-in-time view of the breaker, rendered in handler diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub is_open: bool,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub last_failure_ms_ago: Option<u64>,
}

/// Holds the single trial slot; released when the probe resolves or is dropped.
struct TrialSlot {
    flag: Arc<AtomicBool>,
}

impl Drop for TrialSlot {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Circuit breaker shared by every call routed through it.
///
/// The open/half-open/closed machine is collapsed into an `is_open` flag plus
/// the time of the last failure. There is no background timer: whether the
/// reset timeout has elapsed is decided inline when the next call arrives.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    origin: Instant,
    is_open: AtomicBool,
    failure_count: AtomicU32,
    /// Nanoseconds since `origin`, or `NO_FAILURE`
    last_failure: AtomicU64,
    trial_in_flight: Arc<AtomicBool>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            origin: Instant::now(),
            is_open: AtomicBool::new(false),
            failure_count: AtomicU32::new(0),
            last_failure: AtomicU64::new(NO_FAILURE),
            trial_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` under breaker policy.
    ///
    /// Rejects with [`ResilienceError::CircuitOpen`] without invoking the
    /// operation while the circuit is open. Operation failures are counted and
    /// handed back unchanged as [`ResilienceError::Operation`].
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // Held until the outcome is recorded
        let _trial = self
            .admit()
            .map_err(|retry_after| ResilienceError::CircuitOpen { retry_after })?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(ResilienceError::Operation(err))
            }
        }
    }

    /// Bind `operation` to this breaker, yielding the protected operation.
    pub fn protect<F>(self: Arc<Self>, operation: F) -> Protected<F> {
        Protected {
            breaker: self,
            operation,
        }
    }

    /// Decide whether a call may proceed; `Err` carries the time until a trial.
    fn admit(&self) -> Result<Option<TrialSlot>, Duration> {
        if !self.is_open.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let elapsed = self.since_last_failure().unwrap_or(Duration::MAX);
        if elapsed <= self.config.reset_timeout {
            let retry_after = self.config.reset_timeout - elapsed;
            debug!(
                "Circuit breaker open, rejecting call ({}ms until trial)",
                retry_after.as_millis()
            );
            return Err(retry_after);
        }

        match self.config.trial_admission {
            TrialAdmission::Concurrent => {
                self.is_open.store(false, Ordering::SeqCst);
                info!("Circuit breaker: trying to reset after {}ms", elapsed.as_millis());
                Ok(None)
            }
            TrialAdmission::Single => {
                if self
                    .trial_in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    debug!("Circuit breaker trial already in flight, rejecting call");
                    return Err(Duration::ZERO);
                }
                info!("Circuit breaker: admitting single trial call after {}ms", elapsed.as_millis());
                Ok(Some(TrialSlot {
                    flag: Arc::clone(&self.trial_in_flight),
                }))
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        if self.is_open.swap(false, Ordering::SeqCst) {
            info!("Circuit breaker closed after successful trial call");
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.last_failure.store(self.now_nanos(), Ordering::SeqCst);

        if failure_count >= self.config.failure_threshold {
            if !self.is_open.swap(true, Ordering::SeqCst) {
                warn!("Circuit breaker opened ({} consecutive failures)", failure_count);
            }
        } else {
            debug!(
                "Circuit breaker recorded failure {}/{}",
                failure_count, self.config.failure_threshold
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            is_open: self.is_open(),
            failure_count: self.failure_count(),
            failure_threshold: self.config.failure_threshold,
            reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
            last_failure_ms_ago: self.since_last_failure().map(|d| d.as_millis() as u64),
        }
    }

    /// Force the breaker back to closed with a clean history
    pub fn reset(&self) {
        self.is_open.store(false, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
        self.last_failure.store(NO_FAILURE, Ordering::SeqCst);
    }

    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn since_last_failure(&self) -> Option<Duration> {
        match self.last_failure.load(Ordering::SeqCst) {
            NO_FAILURE => None,
            at => Some(Duration::from_nanos(self.now_nanos().saturating_sub(at))),
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// An operation bound to a shared breaker.
pub struct Protected<F> {
    breaker: Arc<CircuitBreaker>,
    operation: F,
}

impl<F, Fut, T, E> Protected<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    pub async fn call(&self) -> Result<T, ResilienceError<E>> {
        self.breaker.call(&self.operation).await
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

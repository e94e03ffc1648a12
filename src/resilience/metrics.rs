use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{ErrorKind, ResilienceError};

/// Counters for every call routed through the resilience wrappers
#[derive(Debug, Default)]
pub struct ResilienceMetrics {
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    total_call_time_ms: AtomicU64,
    retries: AtomicU64,
    circuit_rejections: AtomicU64,
    timeouts: AtomicU64,
    rate_limited: AtomicU64,
}

impl ResilienceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one wrapped call
    pub fn record<T, E>(&self, result: &Result<T, ResilienceError<E>>, elapsed: Duration) {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        self.total_call_time_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::SeqCst);

        match result {
            Ok(_) => {
                self.successful_calls.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                self.failed_calls.fetch_add(1, Ordering::SeqCst);
                match err.kind() {
                    ErrorKind::CircuitOpen => self.record_circuit_rejection(),
                    ErrorKind::Timeout => {
                        self.timeouts.fetch_add(1, Ordering::SeqCst);
                    }
                    ErrorKind::RateLimited => self.record_rate_limited(),
                    ErrorKind::OperationFailed => {}
                }
            }
        }
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::SeqCst);
    }

    fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_calls = self.total_calls.load(Ordering::SeqCst);
        let successful_calls = self.successful_calls.load(Ordering::SeqCst);
        let failed_calls = self.failed_calls.load(Ordering::SeqCst);
        let total_time = self.total_call_time_ms.load(Ordering::SeqCst);

        let (success_rate, average_call_time_ms) = if total_calls == 0 {
            (1.0, 0.0)
        } else {
            (
                successful_calls as f64 / total_calls as f64,
                total_time as f64 / total_calls as f64,
            )
        };

        MetricsSnapshot {
            total_calls,
            successful_calls,
            failed_calls,
            success_rate,
            average_call_time_ms,
            retries: self.retries.load(Ordering::SeqCst),
            circuit_rejections: self.circuit_rejections.load(Ordering::SeqCst),
            timeouts: self.timeouts.load(Ordering::SeqCst),
            rate_limited: self.rate_limited.load(Ordering::SeqCst),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        for counter in [
            &self.total_calls,
            &self.successful_calls,
            &self.failed_calls,
            &self.total_call_time_ms,
            &self.retries,
            &self.circuit_rejections,
            &self.timeouts,
            &self.rate_limited,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub success_rate: f64,
    pub average_call_time_ms: f64,
    pub retries: u64,
    pub circuit_rejections: u64,
    pub timeouts: u64,
    pub rate_limited: u64,
}

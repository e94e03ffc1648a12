use std::time::Duration;

use poem::http::StatusCode;
use thiserror::Error;

use crate::resilience::rate_limit::RateLimitExceeded;

/// Failure produced by one of the resilience wrappers.
///
/// `E` is the error type of the wrapped operation. Wrappers never swallow it:
/// it either comes back verbatim as [`ResilienceError::Operation`] or is replaced
/// by a more specific kind (circuit open, timeout, rate limited).
#[derive(Error, Debug)]
pub enum ResilienceError<E> {
    #[error("Service unavailable (circuit breaker open, retry in {}ms)", .retry_after.as_millis())]
    CircuitOpen { retry_after: Duration },

    #[error("Request timed out after {}ms ({}ms limit)", .elapsed.as_millis(), .limit.as_millis())]
    Timeout { elapsed: Duration, limit: Duration },

    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    #[error("{0}")]
    Operation(E),
}

/// Failure category, rendered as a snake_case label in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CircuitOpen,
    OperationFailed,
    Timeout,
    RateLimited,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::OperationFailed => "operation_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
        }
    }
}

impl<E> ResilienceError<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResilienceError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            ResilienceError::Timeout { .. } => ErrorKind::Timeout,
            ResilienceError::RateLimited(_) => ErrorKind::RateLimited,
            ResilienceError::Operation(_) => ErrorKind::OperationFailed,
        }
    }

    /// HTTP status the handler layer answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::CircuitOpen | ErrorKind::OperationFailed => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout { .. })
    }

    /// How long the caller should wait before trying again, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ResilienceError::CircuitOpen { retry_after } => Some(*retry_after),
            ResilienceError::RateLimited(exceeded) => Some(exceeded.retry_after),
            _ => None,
        }
    }
}

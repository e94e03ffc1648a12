pub mod circuit_breaker;
pub mod health;
pub mod metrics;
pub mod rate_limit;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::*;
pub use health::*;
pub use metrics::*;
pub use rate_limit::*;
pub use retry::*;
pub use timeout::*;

use poem::Request;

use crate::resilience::CircuitSnapshot;

/// Breaker state as rendered in response diagnostics
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct CircuitBreakerState {
    pub is_open: bool,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub last_failure_ms_ago: Option<u64>,
}

impl From<CircuitSnapshot> for CircuitBreakerState {
    fn from(snapshot: CircuitSnapshot) -> Self {
        Self {
            is_open: snapshot.is_open,
            failure_count: snapshot.failure_count,
            failure_threshold: snapshot.failure_threshold,
            reset_timeout_ms: snapshot.reset_timeout_ms,
            last_failure_ms_ago: snapshot.last_failure_ms_ago,
        }
    }
}

/// Identity a client is rate limited under: its remote IP address.
pub fn client_key(req: &Request) -> String {
    req.remote_addr()
        .as_socket_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_without_remote_addr() {
        let req = Request::builder().finish();
        assert_eq!(client_key(&req), "unknown");
    }

    #[test]
    fn test_breaker_state_from_snapshot() {
        let state = CircuitBreakerState::from(CircuitSnapshot {
            is_open: true,
            failure_count: 2,
            failure_threshold: 2,
            reset_timeout_ms: 5000,
            last_failure_ms_ago: Some(12),
        });
        assert!(state.is_open);
        assert_eq!(state.failure_count, 2);
        assert_eq!(state.last_failure_ms_ago, Some(12));
    }
}

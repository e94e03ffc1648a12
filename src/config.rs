use std::time::Duration;

use crate::resilience::{CircuitBreakerConfig, RateLimitConfig, RetryPolicy};

/// Process settings read from the environment
pub struct Config {
    pub port: u16,
    pub downstream_url: String,
    /// Overall deadline reqwest enforces on every downstream request
    pub downstream_request_timeout: Duration,
    pub simulator_port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT").unwrap_or(3000),
            downstream_url: std::env::var("DOWNSTREAM_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            downstream_request_timeout: Duration::from_millis(
                env_parse("DOWNSTREAM_REQUEST_TIMEOUT_MS").unwrap_or(30_000),
            ),
            simulator_port: env_parse("SIMULATOR_PORT").unwrap_or(3001),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Fixed knobs for the resilience wrappers the gateway handlers apply.
#[derive(Debug, Clone)]
pub struct ResilienceSettings {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub rate_limit: RateLimitConfig,
    /// Probability the circuit breaker demo fails locally before calling downstream
    pub injected_failure_rate: f64,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::new(3, Duration::from_millis(1000)),
            timeout: Duration::from_millis(3000),
            rate_limit: RateLimitConfig::default(),
            injected_failure_rate: 0.8,
        }
    }
}

/// Behavior of the simulated downstream service
#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    pub failure_rate: f64,
    pub slow_delay: Duration,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            failure_rate: 0.3,
            slow_delay: Duration::from_millis(4000),
        }
    }
}

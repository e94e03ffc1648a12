use poem_openapi::{payload::Json, ApiResponse, OpenApi};
use std::sync::Arc;

use crate::api::{timestamp, CircuitBreakerState};
use crate::resilience::{CircuitBreaker, FixedWindowLimiter, MetricsSnapshot, ResilienceMetrics};

pub struct MetricsApi {
    metrics: Arc<ResilienceMetrics>,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<FixedWindowLimiter>,
}

impl MetricsApi {
    pub fn new(
        metrics: Arc<ResilienceMetrics>,
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<FixedWindowLimiter>,
    ) -> Self {
        Self {
            metrics,
            breaker,
            limiter,
        }
    }
}

/// Metrics response
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct MetricsResponse {
    pub calls: CallMetrics,
    pub circuit_breaker: CircuitBreakerState,
    pub rate_limited_clients: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct CallMetrics {
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

impl From<MetricsSnapshot> for CallMetrics {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            total_calls: snapshot.total_calls,
            successful_calls: snapshot.successful_calls,
            failed_calls: snapshot.failed_calls,
            success_rate: snapshot.success_rate,
            average_call_time_ms: snapshot.average_call_time_ms,
            retries: snapshot.retries,
            circuit_rejections: snapshot.circuit_rejections,
            timeouts: snapshot.timeouts,
            rate_limited: snapshot.rate_limited,
        }
    }
}

#[derive(ApiResponse)]
pub enum GetMetricsResponse {
    #[oai(status = 200)]
    Ok(Json<MetricsResponse>),
}

#[OpenApi]
impl MetricsApi {
    /// Get metrics for monitoring and observability
    ///
    /// Returns call counts, retry and rejection statistics and the current
    /// circuit breaker state.
    #[oai(path = "/metrics", method = "get")]
    async fn get_metrics(&self) -> GetMetricsResponse {
        GetMetricsResponse::Ok(Json(MetricsResponse {
            calls: self.metrics.snapshot().into(),
            circuit_breaker: self.breaker.snapshot().into(),
            rate_limited_clients: self.limiter.tracked_clients() as u64,
            timestamp: timestamp(),
        }))
    }
}

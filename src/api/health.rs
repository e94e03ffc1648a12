use poem_openapi::{payload::Json, ApiResponse, OpenApi};
use std::sync::Arc;

use crate::api::{timestamp, CircuitBreakerState};
use crate::resilience::CircuitBreaker;

pub struct HealthApi {
    breaker: Arc<CircuitBreaker>,
}

impl HealthApi {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }
}

/// Detailed health check response
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub circuit_breaker: CircuitBreakerState,
}

#[derive(ApiResponse)]
pub enum HealthResponse {
    #[oai(status = 200)]
    Ok(Json<HealthStatus>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<HealthStatus>),
}

#[OpenApi]
impl HealthApi {
    /// Health check endpoint
    ///
    /// Degraded while the downstream circuit breaker is open.
    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> HealthResponse {
        let circuit_breaker = CircuitBreakerState::from(self.breaker.snapshot());
        let degraded = circuit_breaker.is_open;

        let health = HealthStatus {
            status: if degraded { "degraded" } else { "healthy" }.to_string(),
            service: "faultguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: timestamp(),
            circuit_breaker,
        };

        if degraded {
            HealthResponse::ServiceUnavailable(Json(health))
        } else {
            HealthResponse::Ok(Json(health))
        }
    }
}

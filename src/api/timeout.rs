use std::sync::Arc;
use std::time::Duration;

use poem::http::StatusCode;
use poem_openapi::{payload::Json, ApiResponse, Object, OpenApi};
use serde_json::Value;
use tokio::time::Instant;
use tracing::error;

use crate::api::timestamp;
use crate::downstream::DownstreamClient;
use crate::resilience::{ResilienceMetrics, TimeoutGuard};

pub struct TimeoutApi {
    client: Arc<DownstreamClient>,
    guard: TimeoutGuard,
    metrics: Arc<ResilienceMetrics>,
}

impl TimeoutApi {
    pub fn new(client: Arc<DownstreamClient>, limit: Duration, metrics: Arc<ResilienceMetrics>) -> Self {
        Self {
            client,
            guard: TimeoutGuard::new(limit, "Slow API Call"),
            metrics,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct TimeoutSuccess {
    pub status: String,
    pub data: Value,
    pub message: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct TimeoutFailure {
    pub status: String,
    pub error: String,
    pub details: String,
    pub elapsed_ms: u64,
    pub limit_ms: u64,
    pub timestamp: String,
}

#[derive(ApiResponse)]
pub enum TimeoutResponse {
    #[oai(status = 200)]
    Ok(Json<TimeoutSuccess>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<TimeoutFailure>),

    #[oai(status = 504)]
    GatewayTimeout(Json<TimeoutFailure>),
}

#[OpenApi]
impl TimeoutApi {
    /// Call the slow downstream endpoint under a deadline
    #[oai(path = "/timeout", method = "get")]
    async fn timeout(&self) -> TimeoutResponse {
        let start = Instant::now();
        let result = self.guard.run(self.client.call("/slow-api")).await;
        let elapsed = start.elapsed();
        self.metrics.record(&result, elapsed);

        let elapsed_ms = elapsed.as_millis() as u64;
        match result {
            Ok(response) => TimeoutResponse::Ok(Json(TimeoutSuccess {
                status: "success".to_string(),
                data: response.body,
                message: "Request completed within time limit".to_string(),
                elapsed_ms,
            })),
            Err(err) => {
                let details = if err.is_timeout() {
                    "Service did not respond in time"
                } else {
                    "Service failed before the time limit"
                };
                error!(error = %err, elapsed_ms, "{} request failed", self.guard.label());

                let body = Json(TimeoutFailure {
                    status: "error".to_string(),
                    error: err.to_string(),
                    details: details.to_string(),
                    elapsed_ms,
                    limit_ms: self.guard.limit().as_millis() as u64,
                    timestamp: timestamp(),
                });
                match err.status_code() {
                    StatusCode::GATEWAY_TIMEOUT => TimeoutResponse::GatewayTimeout(body),
                    _ => TimeoutResponse::ServiceUnavailable(body),
                }
            }
        }
    }
}

use std::sync::Arc;

use anyhow::anyhow;
use poem_openapi::{param::Query, payload::Json, ApiResponse, Object, OpenApi};
use serde_json::Value;
use tokio::time::Instant;
use tracing::warn;

use crate::api::{timestamp, CircuitBreakerState};
use crate::downstream::DownstreamClient;
use crate::resilience::{CircuitBreaker, ResilienceMetrics};

pub struct CircuitBreakerApi {
    breaker: Arc<CircuitBreaker>,
    client: Arc<DownstreamClient>,
    metrics: Arc<ResilienceMetrics>,
    injected_failure_rate: f64,
}

impl CircuitBreakerApi {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        client: Arc<DownstreamClient>,
        metrics: Arc<ResilienceMetrics>,
        injected_failure_rate: f64,
    ) -> Self {
        Self {
            breaker,
            client,
            metrics,
            injected_failure_rate,
        }
    }

    /// The call the breaker guards.
    ///
    /// Test mode fails deterministically until the breaker has counted enough
    /// failures to trip, then succeeds without touching the downstream.
    async fn guarded_call(&self, test_mode: bool) -> anyhow::Result<Value> {
        if test_mode {
            if self.breaker.failure_count() < self.breaker.config().failure_threshold {
                return Err(anyhow!("[TEST MODE] Forced failure to trigger circuit breaker"));
            }
            return Ok(Value::String("Success after test failures".to_string()));
        }

        if fastrand::f64() < self.injected_failure_rate {
            return Err(anyhow!("Service B failed randomly"));
        }
        let response = self.client.call("/api").await?;
        Ok(response.body)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct CircuitMetadata {
    pub test_mode: bool,
    pub circuit_breaker: CircuitBreakerState,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct CircuitBreakerSuccess {
    pub data: Value,
    pub metadata: CircuitMetadata,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct CircuitBreakerFailure {
    pub error: String,
    pub kind: String,
    pub circuit_breaker: CircuitBreakerState,
    pub timestamp: String,
}

#[derive(ApiResponse)]
pub enum CircuitBreakerResponse {
    #[oai(status = 200)]
    Ok(Json<CircuitBreakerSuccess>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<CircuitBreakerFailure>),
}

#[OpenApi]
impl CircuitBreakerApi {
    /// Call the downstream through the shared circuit breaker
    ///
    /// `?test=true` forces failures until the breaker trips.
    #[oai(path = "/circuit-breaker", method = "get")]
    async fn circuit_breaker(&self, test: Query<Option<bool>>) -> CircuitBreakerResponse {
        let test_mode = test.0.unwrap_or(false);
        let start = Instant::now();

        let result = self.breaker.call(|| self.guarded_call(test_mode)).await;
        self.metrics.record(&result, start.elapsed());
        let circuit_breaker = CircuitBreakerState::from(self.breaker.snapshot());

        match result {
            Ok(data) => CircuitBreakerResponse::Ok(Json(CircuitBreakerSuccess {
                data,
                metadata: CircuitMetadata {
                    test_mode,
                    circuit_breaker,
                },
            })),
            Err(err) => {
                warn!(kind = err.kind().as_str(), "Circuit breaker call failed: {}", err);
                CircuitBreakerResponse::ServiceUnavailable(Json(CircuitBreakerFailure {
                    error: err.to_string(),
                    kind: err.kind().as_str().to_string(),
                    circuit_breaker,
                    timestamp: timestamp(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{CircuitBreakerConfig, TrialAdmission};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{matchers::*, Mock, MockServer, ResponseTemplate};

    fn api_for(uri: &str, injected_failure_rate: f64) -> (CircuitBreakerApi, Arc<ResilienceMetrics>) {
        let breaker = Arc::new(CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 2,
            reset_timeout: Duration::from_secs(60),
            trial_admission: TrialAdmission::Concurrent,
        }));
        let client = Arc::new(DownstreamClient::new(uri, Duration::from_secs(5)).unwrap());
        let metrics = Arc::new(ResilienceMetrics::new());
        let api = CircuitBreakerApi::new(breaker, client, Arc::clone(&metrics), injected_failure_rate);
        (api, metrics)
    }

    #[tokio::test]
    async fn test_test_mode_trips_breaker_then_rejects() {
        let (api, metrics) = api_for("http://localhost:9999", 0.0);

        for expected_failures in 1..=2 {
            match api.circuit_breaker(Query(Some(true))).await {
                CircuitBreakerResponse::ServiceUnavailable(Json(body)) => {
                    assert_eq!(body.kind, "operation_failed");
                    assert!(body.error.contains("[TEST MODE]"));
                    assert_eq!(body.circuit_breaker.failure_count, expected_failures);
                }
                _ => panic!("Expected ServiceUnavailable response"),
            }
        }

        match api.circuit_breaker(Query(Some(true))).await {
            CircuitBreakerResponse::ServiceUnavailable(Json(body)) => {
                assert_eq!(body.kind, "circuit_open");
                assert!(body.circuit_breaker.is_open);
            }
            _ => panic!("Expected ServiceUnavailable response"),
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_calls, 3);
        assert_eq!(snapshot.circuit_rejections, 1);
    }

    #[tokio::test]
    async fn test_downstream_success_passes_through() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": "Success from Service B"
            })))
            .mount(&mock_server)
            .await;

        let (api, _) = api_for(&mock_server.uri(), 0.0);
        match api.circuit_breaker(Query(None)).await {
            CircuitBreakerResponse::Ok(Json(body)) => {
                assert_eq!(body.data["data"], "Success from Service B");
                assert!(!body.metadata.test_mode);
                assert!(!body.metadata.circuit_breaker.is_open);
                assert_eq!(body.metadata.circuit_breaker.failure_count, 0);
            }
            _ => panic!("Expected Ok response"),
        }
    }

    #[tokio::test]
    async fn test_downstream_failures_open_circuit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "Service B encountered an error"
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let (api, _) = api_for(&mock_server.uri(), 0.0);
        for _ in 0..3 {
            let _ = api.circuit_breaker(Query(Some(false))).await;
        }

        match api.circuit_breaker(Query(Some(false))).await {
            CircuitBreakerResponse::ServiceUnavailable(Json(body)) => {
                assert_eq!(body.kind, "circuit_open");
                assert_eq!(body.circuit_breaker.failure_count, 2);
            }
            _ => panic!("Expected ServiceUnavailable response"),
        }
    }

    #[tokio::test]
    async fn test_injected_failure_skips_downstream() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (api, _) = api_for(&mock_server.uri(), 1.0);
        match api.circuit_breaker(Query(None)).await {
            CircuitBreakerResponse::ServiceUnavailable(Json(body)) => {
                assert_eq!(body.error, "Service B failed randomly");
            }
            _ => panic!("Expected ServiceUnavailable response"),
        }
    }
}

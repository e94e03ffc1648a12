use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use poem_openapi::{payload::Json, ApiResponse, Object, OpenApi};
use serde_json::Value;
use tokio::time::Instant;

use crate::downstream::{DownstreamClient, DownstreamError};
use crate::error::ResilienceError;
use crate::resilience::{with_retry_notify, ResilienceMetrics, RetryPolicy};

pub struct RetryApi {
    client: Arc<DownstreamClient>,
    policy: RetryPolicy,
    metrics: Arc<ResilienceMetrics>,
}

impl RetryApi {
    pub fn new(client: Arc<DownstreamClient>, policy: RetryPolicy, metrics: Arc<ResilienceMetrics>) -> Self {
        Self {
            client,
            policy,
            metrics,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct RetrySuccess {
    pub success: bool,
    pub data: Value,
    pub attempts: u32,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct RetryFailure {
    pub success: bool,
    pub error: String,
    pub attempts: u32,
    pub logs: Vec<String>,
}

#[derive(ApiResponse)]
pub enum RetryResponse {
    #[oai(status = 200)]
    Ok(Json<RetrySuccess>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<RetryFailure>),
}

fn push_log(logs: &Mutex<Vec<String>>, line: String) {
    logs.lock().unwrap_or_else(PoisonError::into_inner).push(line);
}

#[OpenApi]
impl RetryApi {
    /// Call the downstream with a bounded, fixed-delay retry
    #[oai(path = "/retry", method = "get")]
    async fn retry(&self) -> RetryResponse {
        let logs = Mutex::new(Vec::new());
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        let result = with_retry_notify(
            &self.policy,
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                push_log(&logs, format!("Attempt {}: Calling Service B...", attempt));
                let client = &self.client;
                let logs = &logs;
                async move {
                    let response = client.call("/api").await?;
                    push_log(logs, format!("Attempt {}: Success!", attempt));
                    Ok::<_, DownstreamError>(response.body)
                }
            },
            |attempt, err| {
                push_log(&logs, format!("Attempt {}: Failed - {}", attempt, err));
                if attempt < self.policy.max_retries {
                    self.metrics.record_retry();
                }
            },
        )
        .await
        .map_err(ResilienceError::Operation);
        self.metrics.record(&result, start.elapsed());

        let attempts = attempts.into_inner();
        let logs = logs.into_inner().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(data) => RetryResponse::Ok(Json(RetrySuccess {
                success: true,
                data,
                attempts,
                logs,
            })),
            Err(err) => RetryResponse::ServiceUnavailable(Json(RetryFailure {
                success: false,
                error: err.to_string(),
                attempts,
                logs,
            })),
        }
    }
}

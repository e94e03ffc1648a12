//! Flaky and slow downstream service used to exercise the gateway.

use poem_openapi::{payload::Json, ApiResponse, Object, OpenApi};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::config::SimulatorSettings;

pub struct SimulatorApi {
    settings: SimulatorSettings,
}

impl SimulatorApi {
    pub fn new(settings: SimulatorSettings) -> Self {
        Self { settings }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct SimulatorReply {
    pub data: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct SimulatorFailure {
    pub error: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct SlowReply {
    pub data: String,
    pub processing_time_ms: u64,
    pub timestamp: String,
}

#[derive(ApiResponse)]
pub enum FlakyResponse {
    #[oai(status = 200)]
    Ok(Json<SimulatorReply>),

    #[oai(status = 500)]
    Failed(Json<SimulatorFailure>),
}

#[derive(ApiResponse)]
pub enum SlowResponse {
    #[oai(status = 200)]
    Ok(Json<SlowReply>),
}

#[OpenApi]
impl SimulatorApi {
    /// Succeeds most of the time, fails with a 500 at the configured rate
    #[oai(path = "/api", method = "get")]
    async fn flaky(&self) -> FlakyResponse {
        let timestamp = chrono::Utc::now().to_rfc3339();
        if fastrand::f64() < self.settings.failure_rate {
            warn!("Simulated downstream failure");
            return FlakyResponse::Failed(Json(SimulatorFailure {
                error: "Service B encountered an error".to_string(),
                timestamp,
            }));
        }

        FlakyResponse::Ok(Json(SimulatorReply {
            data: "Success from Service B".to_string(),
            timestamp,
        }))
    }

    /// Always succeeds, after a fixed delay
    #[oai(path = "/slow-api", method = "get")]
    async fn slow(&self) -> SlowResponse {
        let start = Instant::now();
        info!("Starting slow-api processing");
        sleep(self.settings.slow_delay).await;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!("slow-api completed in {}ms", processing_time_ms);
        SlowResponse::Ok(Json(SlowReply {
            data: "Slow response from Service B".to_string(),
            processing_time_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }))
    }
}

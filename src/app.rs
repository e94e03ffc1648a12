use std::sync::Arc;

use poem::{Endpoint, EndpointExt, Route};
use poem_openapi::OpenApiService;

use crate::api::{CircuitBreakerApi, HealthApi, MetricsApi, RateLimitApi, RetryApi, TimeoutApi};
use crate::config::{Config, ResilienceSettings, SimulatorSettings};
use crate::downstream::{DownstreamClient, DownstreamError};
use crate::observability::RequestTracingMiddleware;
use crate::resilience::{CircuitBreaker, FixedWindowLimiter, ResilienceMetrics};
use crate::simulator::SimulatorApi;

/// Shared state of the gateway, created once at startup and injected into
/// every handler that needs it.
pub struct Gateway {
    client: Arc<DownstreamClient>,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<FixedWindowLimiter>,
    metrics: Arc<ResilienceMetrics>,
    settings: ResilienceSettings,
}

impl Gateway {
    pub fn new(config: &Config, settings: ResilienceSettings) -> Result<Self, DownstreamError> {
        let client = DownstreamClient::new(&config.downstream_url, config.downstream_request_timeout)?;
        Ok(Self {
            client: Arc::new(client),
            breaker: Arc::new(CircuitBreaker::with_config(settings.circuit_breaker.clone())),
            limiter: Arc::new(FixedWindowLimiter::new(settings.rate_limit.clone())),
            metrics: Arc::new(ResilienceMetrics::new()),
            settings,
        })
    }

    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.breaker)
    }

    pub fn limiter(&self) -> Arc<FixedWindowLimiter> {
        Arc::clone(&self.limiter)
    }

    pub fn routes(&self, server_url: &str) -> impl Endpoint {
        let apis = (
            HealthApi::new(self.breaker()),
            MetricsApi::new(Arc::clone(&self.metrics), self.breaker(), self.limiter()),
            CircuitBreakerApi::new(
                self.breaker(),
                Arc::clone(&self.client),
                Arc::clone(&self.metrics),
                self.settings.injected_failure_rate,
            ),
            RetryApi::new(
                Arc::clone(&self.client),
                self.settings.retry.clone(),
                Arc::clone(&self.metrics),
            ),
            TimeoutApi::new(
                Arc::clone(&self.client),
                self.settings.timeout,
                Arc::clone(&self.metrics),
            ),
            RateLimitApi::new(self.limiter(), Arc::clone(&self.metrics)),
        );

        let api_service = OpenApiService::new(apis, "faultguard", env!("CARGO_PKG_VERSION")).server(server_url);
        let ui = api_service.swagger_ui();
        let spec = api_service.spec_endpoint();

        Route::new()
            .nest("/", api_service)
            .nest("/docs", ui)
            .nest("/spec", spec)
            .with(RequestTracingMiddleware)
    }
}

/// Routes of the simulated downstream service.
pub fn simulator_routes(settings: SimulatorSettings, server_url: &str) -> impl Endpoint {
    let api_service = OpenApiService::new(SimulatorApi::new(settings), "faultguard downstream", env!("CARGO_PKG_VERSION"))
        .server(server_url);

    Route::new()
        .nest("/", api_service)
        .with(RequestTracingMiddleware)
}

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use tracing::{debug, error};

use crate::downstream::error::DownstreamError;

/// Successful downstream reply
#[derive(Debug, Clone)]
pub struct DownstreamResponse {
    pub status: u16,
    pub body: Value,
}

/// HTTP client for the service the gateway protects
pub struct DownstreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl DownstreamClient {
    /// `request_timeout` bounds every request on its own, so a call abandoned
    /// by a timeout guard still cannot hold a connection forever.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, DownstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn build_url(&self, route: &str) -> String {
        if route.starts_with('/') {
            format!("{}{}", self.base_url, route)
        } else {
            format!("{}/{}", self.base_url, route)
        }
    }

    /// GET `route`; any non-2xx status is a failure.
    pub async fn call(&self, route: &str) -> Result<DownstreamResponse, DownstreamError> {
        let url = self.build_url(route);
        debug!("Calling downstream: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Downstream error: {} - {}", status, text);
            return Err(DownstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = serde_json::from_str(&text)?;
        Ok(DownstreamResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer) -> DownstreamClient {
        DownstreamClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_build_url() {
        let client = DownstreamClient::new("http://localhost:3001/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.build_url("/api"), "http://localhost:3001/api");
        assert_eq!(client.build_url("slow-api"), "http://localhost:3001/slow-api");
    }

    #[tokio::test]
    async fn test_call_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": "Success from Service B"
            })))
            .mount(&mock_server)
            .await;

        let response = assert_ok!(client_for(&mock_server).call("/api").await);
        assert_eq!(response.status, 200);
        assert_eq!(response.body["data"], "Success from Service B");
    }

    #[tokio::test]
    async fn test_call_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "Service B encountered an error"
            })))
            .mount(&mock_server)
            .await;

        let error = assert_err!(client_for(&mock_server).call("/api").await);
        match error {
            DownstreamError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("Service B encountered an error"));
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_invalid_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
            .mount(&mock_server)
            .await;

        let error = assert_err!(client_for(&mock_server).call("/api").await);
        assert!(matches!(error, DownstreamError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn test_call_network_error() {
        let client = DownstreamClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let error = assert_err!(client.call("/api").await);
        assert!(matches!(error, DownstreamError::Network(_)));
    }

    #[tokio::test]
    async fn test_request_timeout_is_enforced() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow-api"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let client = DownstreamClient::new(&mock_server.uri(), Duration::from_millis(50)).unwrap();
        let error = assert_err!(client.call("/slow-api").await);
        match error {
            DownstreamError::Network(err) => assert!(err.is_timeout()),
            other => panic!("Expected Network timeout, got {:?}", other),
        }
    }
}

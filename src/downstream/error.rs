use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownstreamError {
    #[error("Downstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let error = DownstreamError::Status {
            status: 500,
            body: "{\"error\":\"Service B encountered an error\"}".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Downstream returned HTTP 500: {\"error\":\"Service B encountered an error\"}"
        );
    }

    #[test]
    fn test_invalid_body_converts_from_serde() {
        let parse_error = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let error = DownstreamError::from(parse_error);
        assert!(matches!(error, DownstreamError::InvalidBody(_)));
        assert!(error.to_string().starts_with("Invalid response body"));
    }
}

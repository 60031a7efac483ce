use actix_web::{http::StatusCode, HttpResponse, ResponseError};

/// Failures the gateway synthesizes itself.
///
/// Errors reported by the backend are not represented here: they are relayed
/// to the caller with the backend's own status.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Backend could not be reached (connect/DNS/IO failure)
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
    /// Backend did not answer within the configured timeout
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),
    /// Proxy path or query rejected before forwarding
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Classify a transport failure from the HTTP client.
    pub fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::UpstreamTimeout(e.to_string())
        } else {
            GatewayError::UpstreamUnreachable(e.to_string())
        }
    }

    fn code(&self) -> &'static str {
        match self {
            GatewayError::UpstreamUnreachable(_) => "upstream_unreachable",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
            GatewayError::InvalidPath(_) => "invalid_path",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            GatewayError::UpstreamUnreachable(msg) => {
                tracing::error!(error = %msg, "upstream unreachable");
                crate::metrics::UPSTREAM_FAILURES
                    .with_label_values(&["unreachable"])
                    .inc();
                "Failed to reach upstream service".to_string()
            }
            GatewayError::UpstreamTimeout(msg) => {
                tracing::error!(error = %msg, "upstream timed out");
                crate::metrics::UPSTREAM_FAILURES
                    .with_label_values(&["timeout"])
                    .inc();
                "Upstream service did not respond in time".to_string()
            }
            GatewayError::InvalidPath(msg) => msg.clone(),
            GatewayError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                "An internal error occurred".to_string()
            }
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }))
    }
}

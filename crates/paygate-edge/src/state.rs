use crate::config::GatewayConfig;
use crate::error::GatewayError;
use std::sync::Arc;

/// Shared application state. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .redirect(reqwest::redirect::Policy::none()) // Relay backend redirects as-is
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }
}

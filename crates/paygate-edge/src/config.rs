use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RATE_LIMIT_RPM: u32 = 120;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// How the backend expects login credentials to be presented.
///
/// Selected once at startup; the credential translator dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantStyle {
    /// OAuth password grant against `POST {base}/oauth/token`.
    Password,
    /// Plain `{email, password}` against `POST {base}/auth/login`.
    Direct,
}

impl GrantStyle {
    /// Backend path that accepts login requests for this style.
    pub fn login_path(&self) -> &'static str {
        match self {
            GrantStyle::Password => "/oauth/token",
            GrantStyle::Direct => "/auth/login",
        }
    }
}

impl FromStr for GrantStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "password" | "oauth" | "oauth_password" => Ok(GrantStyle::Password),
            "direct" | "credentials" => Ok(GrantStyle::Direct),
            other => Err(ConfigError::InvalidGrantStyle(other.to_string())),
        }
    }
}

/// Deployment environment. Controls the `Secure` attribute of the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" | "test" => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the backend payment API (no trailing slash)
    pub backend_base_url: String,
    /// Which login protocol the backend speaks
    pub grant_style: GrantStyle,
    /// Default OAuth client id, used when the submission carries none
    pub client_id: Option<String>,
    /// Default OAuth client secret, used when the submission carries none
    pub client_secret: Option<String>,
    /// Deployment environment
    pub environment: Environment,
    /// Server port
    pub port: u16,
    /// Timeout applied to every backend call
    pub upstream_timeout: Duration,
    /// CORS allowed origins
    pub allowed_origins: Vec<String>,
    /// Rate limit requests per minute
    pub rate_limit_rpm: u32,
    /// Inbound payload limit in bytes
    pub max_body_bytes: usize,
    /// Directory to serve UI static files from (None = don't serve)
    pub spa_dir: Option<String>,
    /// Bearer token required for /metrics endpoint (None = public)
    pub metrics_token: Option<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("backend_base_url", &self.backend_base_url)
            .field("grant_style", &self.grant_style)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("environment", &self.environment)
            .field("port", &self.port)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("spa_dir", &self.spa_dir)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl GatewayConfig {
    /// Minimal configuration pointing at `backend_base_url`, with every other
    /// setting at its default. Used by tests and embedders.
    pub fn new(backend_base_url: &str, grant_style: GrantStyle) -> Result<Self, ConfigError> {
        Ok(Self {
            backend_base_url: normalize_base_url(backend_base_url)?,
            grant_style,
            client_id: None,
            client_secret: None,
            environment: Environment::Production,
            port: DEFAULT_PORT,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            rate_limit_rpm: DEFAULT_RATE_LIMIT_RPM,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            spa_dir: None,
            metrics_token: None,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        // Required: backend base URL
        let base_url = env::var("BACKEND_BASE_URL")
            .map_err(|_| ConfigError::MissingRequired("BACKEND_BASE_URL"))?;

        // Optional: grant style
        let grant_style = match env::var("AUTH_GRANT_STYLE") {
            Ok(s) if !s.trim().is_empty() => s.parse()?,
            _ => GrantStyle::Password,
        };

        let mut config = Self::new(&base_url, grant_style)?;

        // Optional: default client credentials
        config.client_id = env::var("OAUTH_CLIENT_ID").ok().filter(|s| !s.is_empty());
        config.client_secret = env::var("OAUTH_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        config.environment = env::var("APP_ENV")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Environment::Production);

        if let Ok(s) = env::var("PORT") {
            config.port = s.parse().map_err(|_| ConfigError::InvalidNumber("PORT", s))?;
        }

        if let Ok(s) = env::var("UPSTREAM_TIMEOUT_SECS") {
            let secs: u64 = s
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("UPSTREAM_TIMEOUT_SECS", s))?;
            config.upstream_timeout = Duration::from_secs(secs.max(1));
        }

        if let Ok(s) = env::var("ALLOWED_ORIGINS") {
            config.allowed_origins = s
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config.rate_limit_rpm = env::var("RATE_LIMIT_RPM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        config.max_body_bytes = env::var("MAX_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        config.spa_dir = env::var("SPA_DIR").ok().filter(|s| !s.is_empty());
        config.metrics_token = env::var("METRICS_TOKEN").ok().filter(|s| !s.is_empty());

        // Credentialed CORS cannot be combined with a wildcard origin
        if config.allowed_origins.iter().any(|o| o == "*") {
            tracing::error!(
                "Wildcard CORS origin '*' cannot be used with cookie sessions. \
                 Specify explicit origins in ALLOWED_ORIGINS."
            );
            return Err(ConfigError::WildcardOrigin);
        }

        if !config.environment.is_production() {
            tracing::warn!("APP_ENV is non-production: session cookies will not be marked Secure");
        }

        if config.metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set, /metrics endpoint is publicly accessible");
        }

        Ok(config)
    }

    /// Whether the session cookie carries the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }

    /// Join the backend base URL with an absolute backend path.
    pub fn backend_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.backend_base_url,
            path.trim_start_matches('/')
        )
    }
}

/// Validate a base URL and strip its trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|_| ConfigError::InvalidUrl(trimmed.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{trimmed}: scheme must be http or https"
        )));
    }
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("{trimmed}: missing host")));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid grant style: {0} (expected 'password' or 'direct')")]
    InvalidGrantStyle(String),

    #[error("invalid number for {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error("wildcard CORS origin '*' is not allowed with credentialed requests")]
    WildcardOrigin,
}

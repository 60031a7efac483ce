//! Client credential submissions and their translation into backend auth requests.
//!
//! Inbound bodies arrive as JSON, URL-encoded form data or multipart form data.
//! All are first decoded into a flat field map; translation only ever sees that map.

use std::collections::HashMap;

use bytes::Bytes;
use serde::Serialize;

use crate::config::{GatewayConfig, GrantStyle};

/// Field name to string value, as decoded from an inbound submission.
pub type Fields = HashMap<String, String>;

/// Wire encoding of an inbound login/registration body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEncoding {
    Json,
    Form,
    /// `multipart/form-data`; `None` when the boundary is missing or malformed.
    Multipart { boundary: Option<String> },
}

impl SubmissionEncoding {
    /// Anything not declared as JSON or multipart is treated as URL-encoded form data.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("application/json") => {
                SubmissionEncoding::Json
            }
            Some(ct) if ct.to_ascii_lowercase().starts_with("multipart/form-data") => {
                SubmissionEncoding::Multipart {
                    boundary: multer::parse_boundary(ct).ok(),
                }
            }
            _ => SubmissionEncoding::Form,
        }
    }

    /// Decode a body into fields. Unparseable input yields whatever was read
    /// before the error, usually an empty map.
    pub async fn decode(&self, body: Bytes) -> Fields {
        match self {
            SubmissionEncoding::Json => decode_json(&body),
            SubmissionEncoding::Form => url::form_urlencoded::parse(&body).into_owned().collect(),
            SubmissionEncoding::Multipart { boundary: Some(b) } => {
                decode_multipart(body, b.clone()).await
            }
            SubmissionEncoding::Multipart { boundary: None } => {
                tracing::debug!("multipart submission without a boundary, treating as empty");
                Fields::new()
            }
        }
    }
}

fn decode_json(body: &[u8]) -> Fields {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "submission is not valid JSON, treating as empty");
            return Fields::new();
        }
    };

    let serde_json::Value::Object(map) = value else {
        return Fields::new();
    };

    map.into_iter()
        .filter_map(|(k, v)| {
            let s = match v {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((k, s))
        })
        .collect()
}

/// Collect the text parts of a multipart body. File parts are skipped.
async fn decode_multipart(body: Bytes, boundary: String) -> Fields {
    let stream = futures::stream::once(async move { Ok::<Bytes, std::convert::Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut fields = Fields::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "malformed multipart submission");
                break;
            }
        };

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }

        match field.text().await {
            Ok(value) => {
                fields.insert(name, value);
            }
            Err(e) => {
                tracing::debug!(error = %e, "unreadable multipart field");
                break;
            }
        }
    }

    fields
}

/// A login or registration submission, used once and then dropped.
#[derive(Clone, Default)]
pub struct AuthSubmission {
    pub email: String,
    pub password: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl std::fmt::Debug for AuthSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubmission")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl AuthSubmission {
    /// Missing email/password become empty strings; the backend validates them.
    pub fn from_fields(fields: &Fields) -> Self {
        let non_empty = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            email: fields.get("email").cloned().unwrap_or_default(),
            password: fields.get("password").cloned().unwrap_or_default(),
            client_id: non_empty("client_id"),
            client_secret: non_empty("client_secret"),
        }
    }

    pub async fn decode(encoding: &SubmissionEncoding, body: Bytes) -> Self {
        Self::from_fields(&encoding.decode(body).await)
    }
}

/// Body sent to the backend's authentication endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BackendAuthRequest {
    PasswordGrant {
        grant_type: &'static str,
        username: String,
        password: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_secret: Option<String>,
    },
    Direct {
        email: String,
        password: String,
    },
}

/// Which gateway endpoint an auth call originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Login,
    Register,
}

impl AuthKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthKind::Login => "login",
            AuthKind::Register => "register",
        }
    }

    /// Message used when the backend fails without saying anything.
    pub fn failure_message(&self) -> &'static str {
        match self {
            AuthKind::Login => "Login failed",
            AuthKind::Register => "Registration failed",
        }
    }
}

/// A fully-resolved outbound auth call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCall {
    pub url: String,
    pub body: BackendAuthRequest,
}

/// Builds backend auth requests according to the configured grant style.
pub struct CredentialTranslator<'a> {
    config: &'a GatewayConfig,
}

impl<'a> CredentialTranslator<'a> {
    pub fn new(config: &'a GatewayConfig) -> Self {
        Self { config }
    }

    pub fn translate(&self, kind: AuthKind, submission: AuthSubmission) -> AuthCall {
        match kind {
            AuthKind::Login => self.login(submission),
            AuthKind::Register => self.register(submission),
        }
    }

    pub fn login(&self, submission: AuthSubmission) -> AuthCall {
        let style = self.config.grant_style;
        let body = match style {
            GrantStyle::Password => BackendAuthRequest::PasswordGrant {
                grant_type: "password",
                username: submission.email,
                password: submission.password,
                client_id: submission.client_id.or_else(|| self.config.client_id.clone()),
                client_secret: submission
                    .client_secret
                    .or_else(|| self.config.client_secret.clone()),
            },
            GrantStyle::Direct => BackendAuthRequest::Direct {
                email: submission.email,
                password: submission.password,
            },
        };

        AuthCall {
            url: self.config.backend_url(style.login_path()),
            body,
        }
    }

    /// Registration is always the direct shape, whatever the grant style.
    pub fn register(&self, submission: AuthSubmission) -> AuthCall {
        AuthCall {
            url: self.config.backend_url("/auth/register"),
            body: BackendAuthRequest::Direct {
                email: submission.email,
                password: submission.password,
            },
        }
    }
}

use actix_web::http::{header::CONTENT_TYPE, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};

use crate::credentials::{AuthKind, AuthSubmission, CredentialTranslator, SubmissionEncoding};
use crate::error::GatewayError;
use crate::metrics::AUTH_ATTEMPTS;
use crate::normalize::{normalize_error, read_json_body};
use crate::session::{clear_session_cookie, session_token, Session};
use crate::state::AppState;

/// Translate a submission, call the backend, and either issue a session or
/// relay the normalized backend error.
async fn authenticate(
    req: &HttpRequest,
    body: web::Bytes,
    state: &AppState,
    kind: AuthKind,
) -> Result<HttpResponse, GatewayError> {
    let encoding = SubmissionEncoding::from_content_type(
        req.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    );
    let submission = AuthSubmission::decode(&encoding, body).await;
    let call = CredentialTranslator::new(&state.config).translate(kind, submission);

    tracing::debug!(kind = kind.as_str(), url = %call.url, "calling backend auth endpoint");

    let response = state
        .http_client
        .post(&call.url)
        .json(&call.body)
        .send()
        .await
        .map_err(|e| {
            AUTH_ATTEMPTS
                .with_label_values(&[kind.as_str(), "unreachable"])
                .inc();
            GatewayError::from_transport(&e)
        })?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| GatewayError::from_transport(&e))?;

    let relay_status = StatusCode::from_u16(status.as_u16())
        .map_err(|e| GatewayError::Internal(format!("invalid upstream status: {e}")))?;

    if !status.is_success() {
        tracing::info!(kind = kind.as_str(), status = %status, "backend rejected credentials");
        AUTH_ATTEMPTS
            .with_label_values(&[kind.as_str(), "rejected"])
            .inc();
        let payload = normalize_error(content_type.as_deref(), &bytes, kind.failure_message());
        return Ok(HttpResponse::build(relay_status).json(payload));
    }

    AUTH_ATTEMPTS
        .with_label_values(&[kind.as_str(), "success"])
        .inc();

    let data = read_json_body(content_type.as_deref(), &bytes);
    let session = Session::from_auth_response(&data);
    let secure = state.config.secure_cookies();

    let response = match kind {
        AuthKind::Login => {
            let mut builder = HttpResponse::Ok();
            if session.has_token() {
                builder.cookie(session.cookie(secure));
            } else {
                // Leave any existing session cookie untouched
                tracing::warn!("backend login succeeded without an access token");
            }
            builder.json(serde_json::json!({ "ok": true }))
        }
        AuthKind::Register => {
            let mut payload = serde_json::json!({ "ok": true });
            if let Some(user) = data.get("user").filter(|u| !u.is_null()) {
                payload["user"] = user.clone();
            }
            let mut builder = HttpResponse::Ok();
            if session.has_token() {
                builder.cookie(session.cookie(secure));
            }
            builder.json(payload)
        }
    };

    Ok(response)
}

/// POST /auth/login
pub async fn login(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    authenticate(&req, body, &state, AuthKind::Login).await
}

/// POST /auth/register
pub async fn register(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    authenticate(&req, body, &state, AuthKind::Register).await
}

/// POST /auth/logout - drop the session cookie. No backend call.
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(clear_session_cookie(state.config.secure_cookies()))
        .json(serde_json::json!({ "ok": true }))
}

/// GET /auth/session - whether the browser holds a session cookie.
pub async fn session(req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "authenticated": session_token(&req).is_some(),
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/login", web::post().to(login))
        .route("/auth/register", web::post().to(register))
        .route("/auth/logout", web::post().to(logout))
        .route("/auth/session", web::get().to(session));
}

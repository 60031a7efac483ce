//! Session issuance: the backend token lives only in an HttpOnly cookie.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::HttpRequest;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Name of the cookie carrying the backend access token.
pub const SESSION_COOKIE_NAME: &str = "access_token";

/// Session lifetime, matching the backend token lifetime.
pub const SESSION_TTL_SECONDS: i64 = 60 * 60;

/// A session about to be handed to the browser.
#[derive(Clone)]
pub struct Session {
    token: String,
    pub issued_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now(),
            ttl_seconds: SESSION_TTL_SECONDS,
        }
    }

    /// Build a session from a successful backend auth response body.
    pub fn from_auth_response(body: &Value) -> Self {
        Self::new(extract_token(body))
    }

    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + chrono::Duration::seconds(self.ttl_seconds)
    }

    /// The `Set-Cookie` value for this session.
    pub fn cookie(&self, secure: bool) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE_NAME, self.token.clone())
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::seconds(self.ttl_seconds))
            .finish()
    }
}

/// `access_token`, else `token`, else empty.
pub fn extract_token(body: &Value) -> String {
    ["access_token", "token"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .unwrap_or_default()
        .to_string()
}

/// Cookie that makes the browser drop the session.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE_NAME, "")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .finish()
}

/// Recover the session token from an inbound request, if any.
pub fn session_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use serde_json::json;

    #[test]
    fn test_extract_token_precedence() {
        assert_eq!(extract_token(&json!({"access_token": "a", "token": "b"})), "a");
        assert_eq!(extract_token(&json!({"token": "b"})), "b");
        assert_eq!(extract_token(&json!({"access_token": "", "token": "b"})), "b");
        assert_eq!(extract_token(&json!({"user": {"id": 1}})), "");
        assert_eq!(extract_token(&json!({"access_token": 42})), "");
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = Session::new("tok123").cookie(true);
        assert_eq!(cookie.name(), "access_token");
        assert_eq!(cookie.value(), "tok123");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));

        let rendered = cookie.to_string();
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("Max-Age=3600"));
    }

    #[test]
    fn test_insecure_cookie_for_local_env() {
        let cookie = Session::new("tok").cookie(false);
        assert!(!cookie.to_string().contains("Secure"));
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[test]
    fn test_clear_cookie() {
        let cookie = clear_session_cookie(true);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn test_session_debug_hides_token() {
        let session = Session::new("very-secret-token");
        assert!(!format!("{:?}", session).contains("very-secret-token"));
        assert!(session.expires_at() > session.issued_at);
    }

    #[test]
    fn test_session_token_from_request() {
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE_NAME, "tok"))
            .to_http_request();
        assert_eq!(session_token(&req).as_deref(), Some("tok"));

        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE_NAME, ""))
            .to_http_request();
        assert!(session_token(&req).is_none());

        let req = TestRequest::default().to_http_request();
        assert!(session_token(&req).is_none());
    }
}

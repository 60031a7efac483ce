use actix_web::{HttpRequest, HttpResponse};
use bytes::Bytes;
use futures::TryStreamExt;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::metrics::{PROXY_LATENCY, PROXY_REQUESTS_TOTAL};
use crate::session::session_token;
use crate::validation::{proxy_segments, sanitize_query};

pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Response headers owned by the transport rather than the message.
/// `content-length` is recomputed by actix for the relayed body.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// An inbound call reduced to what gets forwarded to the backend.
#[derive(Clone)]
pub struct ProxyRequest {
    pub method: reqwest::Method,
    pub path_segments: Vec<String>,
    pub query: Option<String>,
    pub content_type: Vec<u8>,
    pub idempotency_key: Option<Vec<u8>>,
    pub bearer: Option<String>,
    pub body: Option<Bytes>,
}

impl std::fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("method", &self.method)
            .field("path_segments", &self.path_segments)
            .field("query", &self.query)
            .field("content_type", &String::from_utf8_lossy(&self.content_type))
            .field("has_idempotency_key", &self.idempotency_key.is_some())
            .field("authenticated", &self.bearer.is_some())
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .finish()
    }
}

impl ProxyRequest {
    /// Capture the forwarded subset of an inbound request.
    ///
    /// `raw_tail` is the still-encoded path below the proxy mount point.
    pub fn from_inbound(
        req: &HttpRequest,
        raw_tail: &str,
        body: Bytes,
    ) -> Result<Self, GatewayError> {
        let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
            .map_err(|_| GatewayError::Internal(format!("unsupported method {}", req.method())))?;

        let path_segments = proxy_segments(raw_tail)?;

        let query = match req.uri().query() {
            Some(q) => Some(sanitize_query(q)?).filter(|q| !q.is_empty()),
            None => None,
        };

        let content_type = req
            .headers()
            .get("content-type")
            .map(|v| v.as_bytes().to_vec())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.as_bytes().to_vec());

        let idempotency_key = req
            .headers()
            .get(IDEMPOTENCY_KEY)
            .map(|v| v.as_bytes().to_vec());

        let body = if method == reqwest::Method::GET || method == reqwest::Method::HEAD {
            None
        } else {
            Some(body)
        };

        Ok(Self {
            method,
            path_segments,
            query,
            content_type,
            idempotency_key,
            bearer: session_token(req),
            body,
        })
    }

    /// Backend URL for this request.
    pub fn target_url(&self, config: &GatewayConfig) -> String {
        let mut url = config.backend_url(&self.path_segments.join("/"));
        if let Some(ref q) = self.query {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    fn into_builder(
        self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<reqwest::RequestBuilder, GatewayError> {
        let content_type = reqwest::header::HeaderValue::from_bytes(&self.content_type)
            .map_err(|e| GatewayError::Internal(format!("invalid content-type: {e}")))?;

        let mut builder = client
            .request(self.method, url)
            .header(reqwest::header::CONTENT_TYPE, content_type);

        if let Some(key) = self.idempotency_key {
            let value = reqwest::header::HeaderValue::from_bytes(&key)
                .map_err(|e| GatewayError::Internal(format!("invalid idempotency key: {e}")))?;
            builder = builder.header(IDEMPOTENCY_KEY, value);
        }

        if let Some(token) = self.bearer {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = self.body {
            builder = builder.body(body);
        }

        Ok(builder)
    }
}

/// Forward a request to the backend and relay its response unchanged.
pub async fn forward(
    client: &reqwest::Client,
    config: &GatewayConfig,
    request: ProxyRequest,
) -> Result<HttpResponse, GatewayError> {
    let url = request.target_url(config);
    let method = request.method.clone();
    let authenticated = request.bearer.is_some();

    tracing::debug!(method = %method, url = %url, authenticated, "forwarding request");

    let timer = PROXY_LATENCY.start_timer();
    let response = request
        .into_builder(client, &url)?
        .send()
        .await
        .map_err(|e| GatewayError::from_transport(&e))?;

    timer.observe_duration();

    let status = response.status();

    PROXY_REQUESTS_TOTAL
        .with_label_values(&[method_label(&method), status.as_str()])
        .inc();

    if !status.is_success() {
        tracing::info!(method = %method, url = %url, status = %status, "backend returned non-success");
    }

    let mut builder = HttpResponse::build(
        actix_web::http::StatusCode::from_u16(status.as_u16())
            .map_err(|e| GatewayError::Internal(format!("invalid upstream status: {e}")))?,
    );

    for (name, value) in response.headers() {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        builder.append_header((name.as_str(), value.as_bytes()));
    }

    // Relay the body as it arrives, whatever its size
    let body = response.bytes_stream().inspect_err(|e| {
        tracing::error!(error = %e, "upstream body interrupted");
    });
    Ok(builder.streaming(body))
}

/// Metric label for a request method. Extension methods share one label so
/// clients cannot mint new series.
pub fn method_label(method: &reqwest::Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "OPTIONS" => "OPTIONS",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrantStyle;
    use crate::session::SESSION_COOKIE_NAME;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    fn config() -> GatewayConfig {
        GatewayConfig::new("https://api.example.com/v1", GrantStyle::Password).unwrap()
    }

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(HOP_BY_HOP_HEADERS.contains(&"transfer-encoding"));
        assert!(HOP_BY_HOP_HEADERS.contains(&"content-length"));
        assert!(!HOP_BY_HOP_HEADERS.contains(&"content-type"));
        assert!(!HOP_BY_HOP_HEADERS.contains(&"set-cookie"));
    }

    #[test]
    fn test_method_label_bounds_cardinality() {
        assert_eq!(method_label(&reqwest::Method::GET), "GET");
        assert_eq!(method_label(&reqwest::Method::DELETE), "DELETE");
        assert_eq!(method_label(&reqwest::Method::OPTIONS), "OPTIONS");
        assert_eq!(method_label(&reqwest::Method::TRACE), "other");
        assert_eq!(method_label(&reqwest::Method::CONNECT), "other");
        for i in 0..50 {
            let junk = reqwest::Method::from_bytes(format!("JUNK{i}").as_bytes()).unwrap();
            assert_eq!(method_label(&junk), "other");
        }
    }

    #[test]
    fn test_get_drops_body() {
        let req = TestRequest::get().uri("/proxy/transactions").to_http_request();
        let pr = ProxyRequest::from_inbound(&req, "transactions", Bytes::from_static(b"x")).unwrap();
        assert!(pr.body.is_none());
        assert_eq!(pr.content_type, b"application/json");
        assert!(pr.bearer.is_none());
    }

    #[test]
    fn test_post_keeps_body_and_headers() {
        let req = TestRequest::post()
            .uri("/proxy/transactions?dry_run=1")
            .insert_header(("content-type", "text/csv"))
            .insert_header(("Idempotency-Key", "key-123"))
            .insert_header(("X-Forwarded-For", "1.2.3.4"))
            .cookie(Cookie::new(SESSION_COOKIE_NAME, "tok"))
            .to_http_request();
        let pr =
            ProxyRequest::from_inbound(&req, "transactions", Bytes::from_static(b"a,b")).unwrap();
        assert_eq!(pr.body.as_deref(), Some(&b"a,b"[..]));
        assert_eq!(pr.content_type, b"text/csv");
        assert_eq!(pr.idempotency_key.as_deref(), Some(&b"key-123"[..]));
        assert_eq!(pr.bearer.as_deref(), Some("tok"));
        assert_eq!(
            pr.target_url(&config()),
            "https://api.example.com/v1/transactions?dry_run=1"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let req = TestRequest::get()
            .cookie(Cookie::new(SESSION_COOKIE_NAME, "super-secret"))
            .to_http_request();
        let pr = ProxyRequest::from_inbound(&req, "x", Bytes::new()).unwrap();
        assert!(!format!("{:?}", pr).contains("super-secret"));
    }

    #[test]
    fn test_rejects_traversal() {
        let req = TestRequest::get().to_http_request();
        assert!(ProxyRequest::from_inbound(&req, "a/../b", Bytes::new()).is_err());
    }
}

//! CORS configuration for the edge gateway.

use actix_cors::Cors;

/// Build the CORS middleware from allowed origins.
///
/// Credentials are allowed so the browser sends the session cookie on
/// cross-origin calls; wildcard origins are rejected at config time.
pub fn build_cors(allowed_origins: &[String]) -> Cors {
    let allowed = allowed_origins.to_vec();
    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            let origin_str = origin.to_str().unwrap_or("");
            allowed.iter().any(|a| a == origin_str)
        })
        .allowed_methods(vec!["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::ACCEPT,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::HeaderName::from_static("idempotency-key"),
        ])
        .supports_credentials()
        .max_age(3600)
}

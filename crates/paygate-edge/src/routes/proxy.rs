use actix_web::{web, HttpRequest, HttpResponse};

use crate::error::GatewayError;
use crate::proxy::{forward, ProxyRequest};
use crate::state::AppState;

const PROXY_PREFIX: &str = "/proxy";

/// ANY /proxy/{path:.*} - forward to the backend with the session's bearer token
pub async fn proxy(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    // Use the raw URI path so percent-encoding survives untouched
    let tail = req
        .uri()
        .path()
        .strip_prefix(PROXY_PREFIX)
        .unwrap_or_default();
    let request = ProxyRequest::from_inbound(&req, tail, body)?;
    forward(&state.http_client, &state.config, request).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(PROXY_PREFIX).route(web::route().to(proxy)))
        .service(web::resource("/proxy/{path:.*}").route(web::route().to(proxy)));
}

//! Edge gateway that turns browser credential submissions into backend
//! sessions held in HttpOnly cookies, and forwards authenticated API calls.

pub mod config;
pub mod cors;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod proxy;
pub mod routes;
pub mod session;
pub mod state;
pub mod validation;

pub use config::{GatewayConfig, GrantStyle};
pub use error::GatewayError;
pub use state::AppState;

use actix_web::web;

/// Mount every gateway route. The SPA catch-all, if any, goes after this.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(routes::health::configure)
        .configure(routes::auth::configure)
        .configure(routes::proxy::configure);
}

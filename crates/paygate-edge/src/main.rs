use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate_edge::{config::GatewayConfig, metrics::register_metrics, state::AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();
    let rate_limit_rpm = config.rate_limit_rpm;
    let max_body_bytes = config.max_body_bytes;
    let spa_dir = config.spa_dir.clone();

    tracing::info!("Starting paygate-edge on port {}", port);
    tracing::info!("Backend: {}", config.backend_base_url);
    tracing::info!(
        "Login protocol: {:?} ({})",
        config.grant_style,
        config.grant_style.login_path()
    );
    tracing::info!(
        "Session cookies: {}",
        if config.secure_cookies() {
            "Secure"
        } else {
            "not Secure (non-production)"
        }
    );

    register_metrics();

    let state = AppState::new(config).map_err(std::io::Error::other)?;
    let state_data = web::Data::new(state);

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm as u64)
        .finish()
        .ok_or_else(|| std::io::Error::other("invalid rate limiter config"))?;

    if let Some(ref dir) = spa_dir {
        tracing::info!("Serving UI from: {}", dir);
    }

    HttpServer::new(move || {
        let cors = paygate_edge::cors::build_cors(&allowed_origins);

        let mut app = App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(max_body_bytes))
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Governor::new(&governor_conf))
            .configure(paygate_edge::configure);

        // Serve UI static files last (catch-all) if configured
        if let Some(ref dir) = spa_dir {
            let index_path = format!("{}/index.html", dir);
            app = app.service(
                actix_files::Files::new("/", dir)
                    .index_file("index.html")
                    .default_handler(web::to(move || {
                        let path = index_path.clone();
                        async move { actix_files::NamedFile::open_async(path).await }
                    })),
            );
        }

        app
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

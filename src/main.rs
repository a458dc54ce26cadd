use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use utdrs_gateway::config::{self, LogFormat, LoggingConfig};
use utdrs_gateway::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up APP_ENV, LOG_LEVEL, etc.
    let _ = dotenvy::dotenv();

    let config = config::config();
    init_tracing(&config.logging);
    tracing::info!("Starting UTDRS API Gateway in {:?} mode", config.environment);

    let state = AppState::from_config(config);
    let app = utdrs_gateway::app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("UTDRS_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(config.server.port);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("UTDRS API Gateway listening on http://{}", bind_addr);

    // connect_info makes the peer address visible to the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server");
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::Router;

use utdrs_gateway::middleware::{self, RateLimiter, SecurityPolicy};
use utdrs_gateway::state::AppState;

pub struct TestServer {
    pub base_url: String,
}

/// Spawn the app in-process on an ephemeral port and return its base URL.
pub async fn spawn(app: Router) -> Result<TestServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server");
    });
    Ok(TestServer {
        base_url: format!("http://{}", addr),
    })
}

/// Compose extra routes (handlers under test) with the gateway's own
/// routes and the full middleware pipeline, then serve.
pub async fn serve_with(
    routes: Router<AppState>,
    policy: SecurityPolicy,
    limiter: Option<RateLimiter>,
) -> Result<TestServer> {
    let state = AppState::new(policy, limiter);
    let routes = routes
        .route("/", axum::routing::get(utdrs_gateway::handlers::health::root))
        .route(
            "/health",
            axum::routing::get(utdrs_gateway::handlers::health::health),
        );
    spawn(middleware::apply(routes, state)).await
}

/// Wide-open policy for tests that exercise something other than the gate.
pub fn permissive_policy() -> SecurityPolicy {
    SecurityPolicy::new(vec!["*".to_string()], 10 * 1024 * 1024)
}

#[allow(dead_code)]
pub fn small_limiter(max_requests: u32, window_ms: u64) -> RateLimiter {
    RateLimiter::new(max_requests, Duration::from_millis(window_ms))
}

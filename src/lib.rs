pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod sanitize;
pub mod state;
pub mod validation;

use axum::{routing::get, Router};

use state::AppState;

/// Build the gateway application: the gateway's own routes wrapped in the
/// full middleware pipeline. Domain routers register against the same
/// `Router<AppState>` before `middleware::apply` composes the chain.
pub fn app(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health));

    middleware::apply(routes, state)
}

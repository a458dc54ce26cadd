pub mod error_handler;
pub mod observability;
pub mod rate_limit;
pub mod security;

pub use error_handler::{error_handler_middleware, handle_panic};
pub use observability::request_logging_middleware;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
pub use security::{security_middleware, RequestContext, SecurityPolicy};

use axum::{middleware, Router};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::error::ApiError;
use crate::state::AppState;

/// Fallback for unmatched routes. Returning `ApiError` here keeps
/// framework-produced 404s on the same envelope contract as every other
/// failure.
async fn not_found_fallback() -> ApiError {
    ApiError::not_found("Resource not found")
}

/// Compose the pipeline as an explicit ordered chain around the routes.
///
/// Request path, outermost first: CORS, security gate (correlation id, host
/// and size checks, response headers), request logging, error boundary, rate
/// limiter, panic boundary, then route dispatch. The security gate being
/// outermost is what guarantees that every response, including classifier
/// output and rate limit short-circuits, carries the security headers.
pub fn apply(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .fallback(not_found_fallback)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(error_handler_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

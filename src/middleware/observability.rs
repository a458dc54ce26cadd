use std::time::Instant;

use axum::{extract::Request, http::header, middleware::Next, response::Response};

use crate::middleware::security::RequestContext;

/// Request start/completion logging.
///
/// A pure side channel: logs an event before delegating and another when the
/// response comes back, never touching bytes or headers. Sits outside the
/// error classifier so classifier-synthesized responses are still timed and
/// logged with their final status.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map_or_else(|| "unset".to_string(), |ctx| ctx.request_id.clone());
    let method = request.method().clone();
    let url = request.uri().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    tracing::info!(
        method = %method,
        url = %url,
        user_agent = user_agent.as_deref(),
        request_id = %request_id,
        "Incoming request"
    );

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        status_code = response.status().as_u16(),
        elapsed_ms,
        request_id = %request_id,
        "Request completed"
    );

    response
}

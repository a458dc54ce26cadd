use std::any::Any;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use crate::error::ApiError;
use crate::middleware::security::RequestContext;

/// Terminal failure boundary for the downstream chain.
///
/// Handlers and extractors surface failures as `ApiError` values; their
/// `IntoResponse` impl stashes the classified error in the response
/// extensions. This stage picks it up, re-renders the envelope with the
/// request's correlation id and logs at the level mapped for the kind. No
/// component upstream of this one needs its own recovery logic.
pub async fn error_handler_middleware(request: Request, next: Next) -> Response {
    let ctx = request.extensions().get::<RequestContext>().cloned();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    let err = match response.extensions_mut().remove::<ApiError>() {
        Some(err) => Some(err),
        // Method mismatches surface as a bare 405 with an empty body from
        // the router; classify them so the envelope contract holds
        None if response.status() == StatusCode::METHOD_NOT_ALLOWED => Some(ApiError::http(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
        )),
        None => None,
    };

    if let Some(err) = err {
        let request_id = ctx.map(|c| c.request_id);
        err.log(request_id.as_deref(), method.as_str(), &path);
        let envelope = err.envelope(request_id);
        return (err.status_code(), Json(envelope)).into_response();
    }

    response
}

/// Handler for panics escaping route code, wired into tower-http's
/// `CatchPanicLayer` inside the error boundary.
///
/// The panic payload is recorded to the log sink here; the response degrades
/// to the unclassified-fault path and never carries the payload.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::internal(format!("panic in request handler: {message}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payload_never_reaches_the_body() {
        let response = handle_panic(Box::new("database password is hunter2".to_string()));
        assert_eq!(response.status(), 500);
        // The classified error rides in the extensions for the boundary to log
        let err = response.extensions().get::<ApiError>().unwrap();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(err.detail(), "An internal server error occurred");
    }
}

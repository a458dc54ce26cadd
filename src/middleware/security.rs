use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Security policy snapshot, read-only for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    /// Allow-listed host substrings, or `"*"` for wildcard.
    pub allowed_hosts: Vec<String>,
    /// Maximum declared request body size in bytes.
    pub max_request_size: usize,
}

impl SecurityPolicy {
    pub fn new(allowed_hosts: Vec<String>, max_request_size: usize) -> Self {
        Self {
            allowed_hosts,
            max_request_size,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.security.allowed_hosts.clone(),
            config.security.max_request_size_bytes,
        )
    }

    /// Validate the declared host against the allow-list.
    ///
    /// Matching is substring containment, not exact match, mirroring the
    /// original gateway's documented policy: an allow-list entry matches any
    /// host that contains it after lower-casing.
    pub fn allows_host(&self, host: Option<&str>) -> bool {
        if self.allowed_hosts.iter().any(|h| h == "*") {
            return true;
        }
        let host = match host {
            Some(h) => h.to_lowercase(),
            None => return false,
        };
        self.allowed_hosts
            .iter()
            .any(|allowed| host.contains(&allowed.to_lowercase()))
    }
}

/// Per-request state threaded through the pipeline.
///
/// Created by the security gate before any other check runs, so even
/// early-rejected requests carry a correlation id. Discarded with the
/// response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub received_at: DateTime<Utc>,
    pub method: Method,
    pub path: String,
    pub client_addr: String,
    pub user_agent: Option<String>,
}

impl RequestContext {
    fn new(request: &Request) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            received_at: Utc::now(),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            client_addr: client_address(request),
            user_agent: request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

/// Derive the client network address, once, at context creation.
///
/// Proxy headers first, then the socket peer address. Downstream stages
/// (the rate limiter in particular) key off this field rather than
/// re-deriving it.
fn client_address(request: &Request) -> String {
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return first_ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

/// First and outermost pipeline stage.
///
/// Stamps every request with a correlation id, validates the host header and
/// the declared body size (short-circuiting with 400/413), and injects the
/// fixed security headers on every response leaving the pipeline, whether it
/// came from a handler, a short-circuit, or the error classifier.
pub async fn security_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::new(&request);
    let request_id = ctx.request_id.clone();
    request.extensions_mut().insert(ctx.clone());

    let host = host_header(request.headers());
    let mut response = if !state.policy.allows_host(host.as_deref()) {
        tracing::warn!(
            host = host.as_deref(),
            request_id = %request_id,
            "Rejected request with invalid host header"
        );
        short_circuit(ApiError::bad_request("Invalid host header"), &ctx)
    } else if declared_length_exceeds(request.headers(), state.policy.max_request_size) {
        tracing::warn!(
            max_request_size = state.policy.max_request_size,
            request_id = %request_id,
            "Rejected oversized request"
        );
        short_circuit(
            ApiError::http(StatusCode::PAYLOAD_TOO_LARGE, "Request too large"),
            &ctx,
        )
    } else {
        next.run(request).await
    };

    apply_security_headers(response.headers_mut(), &request_id);
    response
}

fn host_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Check the declared `Content-Length` only; the body itself is never
/// buffered here. A missing or unparseable declaration passes.
fn declared_length_exceeds(headers: &HeaderMap, max: usize) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|length| length > max)
}

/// Build a rejection response without running any further pipeline stage.
///
/// The error classifier never sees these, so log and render the envelope
/// with the correlation id here.
fn short_circuit(err: ApiError, ctx: &RequestContext) -> Response {
    err.log(Some(&ctx.request_id), ctx.method.as_str(), &ctx.path);
    let envelope = err.envelope(Some(ctx.request_id.clone()));
    (err.status_code(), Json(envelope)).into_response()
}

/// Inject the fixed security response headers plus the echoed correlation id.
fn apply_security_headers(headers: &mut HeaderMap, request_id: &str) {
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert("x-request-id", value);
    }
}

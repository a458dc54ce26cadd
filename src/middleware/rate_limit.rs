use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use dashmap::DashMap;

use crate::error::ErrorEnvelope;
use crate::middleware::security::RequestContext;
use crate::state::AppState;

#[derive(Debug)]
struct WindowSlot {
    window_start: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address.
///
/// Explicitly owned and injected through `AppState` rather than held as
/// process-wide ambient state. The per-key entry guard serializes
/// increment-and-check, so concurrent requests for the same key never lose
/// updates.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    counters: DashMap<String, WindowSlot>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            counters: DashMap::new(),
        }
    }

    /// Count one request for `key`. `Err` carries the retry-after hint in
    /// seconds. Budgets reset when the window rolls over, not permanently.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut slot = self.counters.entry(key.to_string()).or_insert(WindowSlot {
            window_start: now,
            count: 0,
        });

        if now.duration_since(slot.window_start) >= self.window {
            slot.window_start = now;
            slot.count = 0;
        }

        slot.count += 1;
        if slot.count > self.max_requests {
            let elapsed = now.duration_since(slot.window_start);
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            Err(retry_after)
        } else {
            Ok(())
        }
    }
}

/// Enforce the per-client request budget.
///
/// Checked independently of the error classifier's value-based flow: on
/// exceeded, this stage short-circuits with its own 429 envelope carrying
/// the retryable `retry_after` hint.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let limiter = match &state.limiter {
        Some(limiter) => limiter.clone(),
        None => return next.run(request).await,
    };

    // The security gate derives the client address once into the context
    let ctx = request.extensions().get::<RequestContext>().cloned();
    let client = ctx
        .as_ref()
        .map_or_else(|| "unknown".to_string(), |c| c.client_addr.clone());

    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let request_id = ctx.map(|c| c.request_id);
            tracing::warn!(
                client_ip = %client,
                request_id = request_id.as_deref(),
                "Rate limit exceeded"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorEnvelope::rate_limited(request_id, retry_after)),
            )
                .into_response()
        }
    }
}

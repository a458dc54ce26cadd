use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::middleware::{RateLimiter, SecurityPolicy};

/// Shared state injected into the pipeline.
///
/// The rate limiter's counters are the only mutable shared state the
/// pipeline touches; they are owned here and passed in explicitly rather
/// than living as ambient process-wide state.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<SecurityPolicy>,
    pub limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(policy: SecurityPolicy, limiter: Option<RateLimiter>) -> Self {
        Self {
            policy: Arc::new(policy),
            limiter: limiter.map(Arc::new),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let limiter = config.api.enable_rate_limiting.then(|| {
            RateLimiter::new(
                config.api.rate_limit_requests,
                Duration::from_secs(config.api.rate_limit_window_secs),
            )
        });
        Self::new(SecurityPolicy::from_config(config), limiter)
    }
}

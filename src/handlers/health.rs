use axum::Json;
use serde_json::{json, Value};

/// Welcome route. The domain routers (auth, alerts, events, assets,
/// detection, simulation) are mounted by their own services; the gateway
/// itself only owns this and `/health`.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the UTDRS API Gateway."
    }))
}

/// Liveness check.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "utdrs-gateway",
    }))
}

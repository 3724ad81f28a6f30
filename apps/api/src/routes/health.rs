use axum::Json;
use serde_json::{json, Value};

/// GET /ping
/// Liveness probe kept for existing clients.
pub async fn ping_handler() -> Json<Value> {
    Json(json!({ "message": "Pong!" }))
}

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cheatsheet-api"
    }))
}

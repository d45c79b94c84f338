use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / — keep-alive probe. Uptime pingers hit this to keep the host
/// from idling the daemon out.
pub async fn alive_handler() -> &'static str {
    "alive"
}

/// GET /health — liveness plus a snapshot of session and rotation state.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "transport": state.transport.status().label(),
        "links": state.store.load_links().len(),
        "cursor": state.store.load_cursor(),
    }))
}

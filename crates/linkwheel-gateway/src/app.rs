use std::sync::Arc;

use axum::{routing::get, Router};

use linkwheel_rotation::RotationStore;
use linkwheel_transport::Transport;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<RotationStore>,
}

/// Assemble the Axum router: a bare keep-alive root plus a health report.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::alive_handler))
        .route("/health", get(crate::http::health_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

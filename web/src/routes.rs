//! Router configuration.

use crate::handlers::{capacity, coverage, health_check, queue, releases};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// `/health` is unauthenticated liveness; everything else lives under `/api`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/releases", post(releases::trigger_release))
        .route("/capacity/:date", get(capacity::get_capacity))
        .route("/queue/:date/:category", get(queue::get_slot_status))
        .route("/queue/:date/:category/wait", get(queue::get_estimated_wait))
        .route("/coverage", get(coverage::get_coverage_gaps));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}

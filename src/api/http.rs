//! HTTP server setup with Axum

use std::sync::Arc;
use axum::{
    routing::get,
    routing::post,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::rest::{cases, events, intake, stats};
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Intake pipeline
        .route("/api/intake", post(intake::submit))
        // Raw log access
        .route("/api/events", get(events::list_events).post(events::append_event))
        // Replayed cases
        .route("/api/cases", get(cases::list_cases))
        .route("/api/cases/:id", get(cases::get_case))
        .route("/api/cases/:id/events", get(cases::get_case_events))
        .route("/api/stats", get(stats::get_stats))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

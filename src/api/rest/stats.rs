//! Statistics endpoint

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};

use super::{blocking, ApiError, ApiResponse};
use crate::api::state::AppState;

/// GET /api/stats - Record counts and log size
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let store = Arc::clone(&state.store);
    let stats = blocking(move || store.stats()).await?;
    Ok(Json(ApiResponse::new(stats)))
}

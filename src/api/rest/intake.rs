//! Intake endpoint

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::{blocking, ApiError, ApiResponse};
use crate::api::state::AppState;
use crate::intake::{IntakeRequest, OutcomeKind};

/// POST /api/intake - Run the intake pipeline
///
/// Returns 201 when an event was appended and 200 for read-only status checks.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IntakeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = request.compose();
    if text.is_empty() {
        return Err(ApiError::bad_request("request has no details"));
    }

    let agent = Arc::clone(&state.agent);
    let outcome = blocking(move || agent.run(&text)).await?;

    let status = match outcome.kind {
        OutcomeKind::StatusCheck => StatusCode::OK,
        OutcomeKind::CaseCreated | OutcomeKind::FollowUp => StatusCode::CREATED,
    };
    Ok((status, Json(ApiResponse::new(outcome))))
}

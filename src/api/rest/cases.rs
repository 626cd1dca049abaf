//! Case endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::{blocking, ApiError, ApiResponse, PaginationParams};
use crate::api::state::AppState;
use crate::event_store::CorruptRecord;
use crate::types::{CaseId, CaseState, Event};

/// Response for GET /api/cases/:id
#[derive(Debug, Serialize)]
pub struct CaseDetail {
    #[serde(flatten)]
    pub state: CaseState,
    /// Unreadable log records met during the replay
    pub corrupt_records: Vec<CorruptRecord>,
    /// True when the replay skipped unreadable records
    pub may_be_incomplete: bool,
}

/// GET /api/cases - List case ids in creation order
pub async fn list_cases(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let store = Arc::clone(&state.store);
    let ids = blocking(move || store.list_cases()).await?;

    let total = ids.len();
    let ids: Vec<CaseId> = ids
        .into_iter()
        .skip(params.offset)
        .take(params.normalized_limit())
        .collect();

    Ok(Json(ApiResponse::with_total(ids, total)))
}

/// GET /api/cases/:id - Current state of a case, rebuilt from its events
pub async fn get_case(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let case_id = CaseId::parse(&id)?;
    let store = Arc::clone(&state.store);
    let replay = blocking(move || store.replay_case(&case_id)).await?;

    Ok(Json(ApiResponse::new(CaseDetail {
        may_be_incomplete: !replay.corrupt_records.is_empty(),
        state: replay.state,
        corrupt_records: replay.corrupt_records,
    })))
}

/// GET /api/cases/:id/events - Events of one case in log order
pub async fn get_case_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let case_id = CaseId::parse(&id)?;
    let store = Arc::clone(&state.store);
    let events: Vec<Event> = blocking(move || {
        store
            .read_for_case(&case_id)
            .map(|events| events.collect::<Vec<_>>())
    })
    .await?;

    if events.is_empty() {
        return Err(ApiError::not_found(format!("case {} not found", id)));
    }

    let total = events.len();
    Ok(Json(ApiResponse::with_total(events, total)))
}

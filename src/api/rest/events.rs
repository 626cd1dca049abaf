//! Raw event endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{blocking, ApiError, ApiResponse};
use crate::api::state::AppState;
use crate::event_store::{CorruptRecord, LogEntry};
use crate::types::{CaseId, Event};
use crate::validation::event_from_value;

/// Query parameters for listing log records
#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    /// Only records for this case
    pub case_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

/// An event with its position in the log
#[derive(Debug, Serialize)]
pub struct LoggedEvent {
    /// 1-based line number
    pub line: usize,
    #[serde(flatten)]
    pub event: Event,
}

/// Response for GET /api/events
#[derive(Debug, Serialize)]
pub struct EventListing {
    pub events: Vec<LoggedEvent>,
    /// Every unreadable record in the log; these cannot be filtered by case
    pub corrupt_records: Vec<CorruptRecord>,
}

/// GET /api/events - Debug listing of log records
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListEventsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let case_id = params
        .case_id
        .as_deref()
        .map(CaseId::parse)
        .transpose()?;

    let store = Arc::clone(&state.store);
    let (events, corrupt_records) = blocking(move || {
        let mut events = Vec::new();
        let mut corrupt_records = Vec::new();
        for entry in store.log().scan()? {
            match entry {
                LogEntry::Event { line, event } => {
                    if case_id.as_ref().map_or(true, |id| *id == event.case_id) {
                        events.push(LoggedEvent { line, event });
                    }
                }
                LogEntry::Corrupt(record) => corrupt_records.push(record),
            }
        }
        Ok::<_, ApiError>((events, corrupt_records))
    })
    .await?;

    let total = events.len();
    let events = events
        .into_iter()
        .skip(params.offset)
        .take(params.limit.min(1000))
        .collect();

    Ok(Json(ApiResponse::with_total(
        EventListing {
            events,
            corrupt_records,
        },
        total,
    )))
}

/// POST /api/events - Validate and append a raw event
pub async fn append_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let event = event_from_value(body)?;

    let store = Arc::clone(&state.store);
    let event = blocking(move || store.append(&event).map(|()| event)).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(event))))
}

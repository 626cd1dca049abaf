//! Replay Engine - fold a case's events into its current state
//!
//! Pure functions only: the same ordered events always produce the same
//! `CaseState`.

use tracing::debug;

use crate::types::{CaseCreatedData, CaseId, CaseState, Event, EventPayload, EventType};

use super::store::{StoreError, StoreResult};

/// Replay the events of `case_id` in the given order
///
/// Events belonging to other cases are ignored, so a whole-log scan can be
/// passed in directly.
pub fn replay<I>(case_id: &CaseId, events: I) -> StoreResult<CaseState>
where
    I: IntoIterator<Item = Event>,
{
    let mut state: Option<CaseState> = None;

    for (position, event) in events
        .into_iter()
        .filter(|event| &event.case_id == case_id)
        .enumerate()
    {
        if let Some(current) = state.as_mut() {
            apply_event(current, event, position)?;
        } else {
            state = Some(initial_state(event)?);
        }
    }

    let state = state.ok_or_else(|| StoreError::CaseNotFound(case_id.clone()))?;
    debug!(
        case_id = %case_id,
        event_count = state.event_count,
        "replayed case"
    );
    Ok(state)
}

/// Build the base state from the first event of a case
fn initial_state(event: Event) -> StoreResult<CaseState> {
    let Event {
        case_id,
        timestamp,
        payload,
        ..
    } = event;

    match payload {
        EventPayload::CaseCreated(CaseCreatedData {
            case_type,
            entities,
            missing_info,
            routing,
            priority,
            sla_due,
            draft_response,
            ..
        }) => Ok(CaseState {
            case_id,
            case_type,
            entities,
            missing_info,
            routing,
            priority,
            sla_due,
            draft_response,
            event_count: 1,
            last_updated: timestamp,
            created_at: timestamp,
            last_event_type: EventType::CaseCreated,
        }),
        EventPayload::FollowUp(_) => Err(StoreError::OrphanFollowUp(case_id)),
    }
}

/// Apply one subsequent event to the state
///
/// Follow-ups merge `entities_update` key by key and replace `missing_info`
/// wholesale. Routing, priority, SLA and draft response stay as created.
pub fn apply_event(state: &mut CaseState, event: Event, position: usize) -> StoreResult<()> {
    match event.payload {
        EventPayload::CaseCreated(_) => {
            return Err(StoreError::DuplicateCaseCreated {
                case_id: event.case_id,
                position,
            });
        }
        EventPayload::FollowUp(data) => {
            state.entities.extend(data.entities_update);
            state.missing_info = data.missing_info_after;
            state.last_event_type = EventType::FollowUp;
        }
    }

    state.event_count += 1;
    state.last_updated = event.timestamp;
    Ok(())
}

//! Data types for the case ledger
//!
//! This module contains the event schema and the derived case state.

mod case_id;
mod entity;
mod event;
mod state;

pub use case_id::{CaseId, InvalidCaseId, CASE_ID_PREFIX};
pub use entity::{Entities, EntityValue};
pub use event::{
    Audit, CaseCreatedData, Event, EventPayload, EventType, FollowUpData, Priority, ToolUsed,
    FLAG_EXTERNAL_NLP_FAILED,
};
pub use state::CaseState;

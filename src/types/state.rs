//! Derived case state
//!
//! `CaseState` is never persisted. It is rebuilt from the log on every read.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{CaseId, Entities, EventType, Priority};

/// Current view of a case, produced by replaying its events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseState {
    pub case_id: CaseId,
    pub case_type: String,
    pub entities: Entities,
    pub missing_info: Vec<String>,
    pub routing: String,
    pub priority: Priority,
    pub sla_due: DateTime<FixedOffset>,
    pub draft_response: String,
    /// Number of events folded into this state
    pub event_count: usize,
    /// Timestamp of the last folded event
    pub last_updated: DateTime<FixedOffset>,
    /// Timestamp of the creating event
    pub created_at: DateTime<FixedOffset>,
    pub last_event_type: EventType,
}

impl CaseState {
    /// True when no required field is outstanding
    pub fn is_complete(&self) -> bool {
        self.missing_info.is_empty()
    }
}

//! Event types for the case log
//!
//! Events are immutable facts. A case begins with exactly one `case_created`
//! event; every later event for the same case id is a `follow_up`. The
//! current state of a case is derived by replaying its events in log order.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{CaseId, Entities};

/// Discriminant of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new case was opened
    CaseCreated,
    /// Additional information arrived for an existing case
    FollowUp,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::CaseCreated => write!(f, "case_created"),
            EventType::FollowUp => write!(f, "follow_up"),
        }
    }
}

/// Which extractor produced the entities recorded in an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolUsed {
    /// Deterministic rule-based extraction
    #[default]
    Rules,
    /// External natural-language extraction service
    ExternalNlp,
}

impl fmt::Display for ToolUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolUsed::Rules => write!(f, "rules"),
            ToolUsed::ExternalNlp => write!(f, "external_nlp"),
        }
    }
}

/// Flag recorded when the external extractor failed and rules were used instead
pub const FLAG_EXTERNAL_NLP_FAILED: &str = "external_nlp_failed";

/// Provenance block attached to every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Audit {
    pub tool_used: ToolUsed,
    #[serde(default)]
    pub flags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Audit {
    pub fn new(tool_used: ToolUsed) -> Self {
        Self {
            tool_used,
            flags: BTreeSet::new(),
            notes: None,
        }
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Case priority, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    /// Older logs spell this level `medium`
    #[serde(alias = "medium")]
    Normal,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Payload of a `case_created` event (the case packet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseCreatedData {
    pub case_type: String,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub missing_info: Vec<String>,
    pub routing: String,
    pub priority: Priority,
    pub sla_due: DateTime<FixedOffset>,
    pub draft_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarifying_question: Option<String>,
}

/// Payload of a `follow_up` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FollowUpData {
    /// Only the keys supplied by this follow-up
    #[serde(default)]
    pub entities_update: Entities,
    /// Recomputed list of fields still required
    #[serde(default)]
    pub missing_info_after: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarifying_question: Option<String>,
}

/// Typed payload, tagged by `event_type` in the serialized record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    CaseCreated(CaseCreatedData),
    FollowUp(FollowUpData),
}

/// An immutable event in the case log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub case_id: CaseId,

    /// Wall-clock time the event was produced; informational only,
    /// log position decides replay order
    pub timestamp: DateTime<FixedOffset>,

    #[serde(flatten)]
    pub payload: EventPayload,

    pub audit: Audit,
}

impl Event {
    /// Build a `case_created` event
    pub fn case_created(
        case_id: CaseId,
        timestamp: DateTime<FixedOffset>,
        data: CaseCreatedData,
        audit: Audit,
    ) -> Self {
        Self {
            case_id,
            timestamp,
            payload: EventPayload::CaseCreated(data),
            audit,
        }
    }

    /// Build a `follow_up` event
    pub fn follow_up(
        case_id: CaseId,
        timestamp: DateTime<FixedOffset>,
        data: FollowUpData,
        audit: Audit,
    ) -> Self {
        Self {
            case_id,
            timestamp,
            payload: EventPayload::FollowUp(data),
            audit,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self.payload {
            EventPayload::CaseCreated(_) => EventType::CaseCreated,
            EventPayload::FollowUp(_) => EventType::FollowUp,
        }
    }

    pub fn is_case_created(&self) -> bool {
        matches!(self.payload, EventPayload::CaseCreated(_))
    }

    /// Serialize event to a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize event from a JSON line
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

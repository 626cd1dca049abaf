//! Request planning
//!
//! Classifies a request into a case type and selects the ordered steps and
//! required fields for it. Classification is keyword based so the outcome
//! is easy to audit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::text::extract_labeled_field;

/// Kind of case a request opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    AccessRequest,
    SecurityIncident,
    MeetingRequest,
    StatusRequest,
    #[default]
    General,
}

impl CaseType {
    pub const ALL: [CaseType; 5] = [
        CaseType::AccessRequest,
        CaseType::SecurityIncident,
        CaseType::MeetingRequest,
        CaseType::StatusRequest,
        CaseType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseType::AccessRequest => "access_request",
            CaseType::SecurityIncident => "security_incident",
            CaseType::MeetingRequest => "meeting_request",
            CaseType::StatusRequest => "status_request",
            CaseType::General => "general",
        }
    }

    /// Fields the plan asks for
    pub fn plan_fields(&self) -> &'static [&'static str] {
        match self {
            CaseType::AccessRequest => &["system_or_asset", "access_level", "people_affected", "approver"],
            CaseType::SecurityIncident => &["what_happened", "when_happened", "affected_system", "reporter_contact"],
            CaseType::MeetingRequest => &["purpose", "attendees", "time_window"],
            CaseType::StatusRequest => &["case_id"],
            CaseType::General => &[],
        }
    }

    /// Ordered steps taken for this kind of case
    pub fn steps(&self) -> &'static [&'static str] {
        match self {
            CaseType::AccessRequest => &[
                "Classify request",
                "Extract key fields",
                "Check missing required fields",
                "Set routing and SLA",
                "Draft acknowledgement",
            ],
            CaseType::SecurityIncident => &[
                "Classify request",
                "Extract incident details",
                "Check missing required fields",
                "Set routing and SLA",
                "Draft acknowledgement",
            ],
            CaseType::MeetingRequest => &[
                "Classify request",
                "Extract meeting details",
                "Check missing required fields",
                "Set routing and SLA",
                "Draft acknowledgement",
            ],
            CaseType::StatusRequest => &[
                "Classify request",
                "Extract case ID (if provided)",
                "Check missing required fields",
                "Draft status response",
            ],
            CaseType::General => &["Classify request", "Summarize request", "Draft acknowledgement"],
        }
    }
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace([' ', '-'], "_");
        CaseType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown case type '{}'", s.trim()))
    }
}

/// What to do with a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub case_type: CaseType,
    pub steps: Vec<String>,
    pub required_fields: Vec<String>,
}

impl Plan {
    /// The standard plan for a case type
    pub fn for_case_type(case_type: CaseType) -> Self {
        Self {
            case_type,
            steps: case_type.steps().iter().map(|s| s.to_string()).collect(),
            required_fields: case_type.plan_fields().iter().map(|s| s.to_string()).collect(),
        }
    }
}

const ACCESS_WORDS: &[&str] = &["access", "permission", "grant", "shared drive", "folder"];
const SECURITY_WORDS: &[&str] = &["security", "incident", "breach", "phishing", "lost device"];
const MEETING_WORDS: &[&str] = &["meeting", "schedule", "invite", "calendar"];
const STATUS_WORDS: &[&str] = &["status", "approved", "approval", "update", "where is"];

/// Keyword classifier; the first matching group wins
pub fn classify(text: &str) -> CaseType {
    let lowered = text.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

    if hit(ACCESS_WORDS) {
        CaseType::AccessRequest
    } else if hit(SECURITY_WORDS) {
        CaseType::SecurityIncident
    } else if hit(MEETING_WORDS) {
        CaseType::MeetingRequest
    } else if hit(STATUS_WORDS) {
        CaseType::StatusRequest
    } else {
        CaseType::General
    }
}

/// Plan a request
///
/// An explicit `Case type: <type>` line naming a known type takes precedence
/// over keyword classification.
pub fn plan_request(text: &str) -> Plan {
    let case_type = extract_labeled_field(text, &["case type"])
        .and_then(|hint| hint.parse().ok())
        .unwrap_or_else(|| classify(text));
    Plan::for_case_type(case_type)
}

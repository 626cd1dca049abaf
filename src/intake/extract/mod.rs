//! Entity extraction
//!
//! An `Extractor` turns request text into entities for a given case type,
//! and writes the clarifying question and summary lines that go with them.
//! `RuleBasedExtractor` is deterministic; `ExternalNlpExtractor` asks an
//! outside service and falls back to the rules when that fails.
//!
//! All extractors emit only the schema keys for the case type, with values
//! coerced to the closed `EntityValue` shapes.

mod nlp;
mod rules;

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Entities, EntityValue, ToolUsed};

use super::planner::CaseType;
use super::text::{clarifying_question, find_emails, next_steps, summary};

pub use nlp::{ExternalNlpExtractor, HttpNlpBackend, NlpBackend};
pub use rules::RuleBasedExtractor;

/// Keys recorded for every case type
pub const COMMON_KEYS: &[&str] = &["requester_name", "requester_contact", "deadline", "location_or_program"];

/// Keys recorded in addition to `COMMON_KEYS` for a case type
pub fn case_keys(case_type: CaseType) -> &'static [&'static str] {
    match case_type {
        CaseType::AccessRequest => &["system_or_asset", "access_level", "people_affected", "approver"],
        CaseType::SecurityIncident => &["what_happened", "when_happened", "affected_system", "reporter_contact"],
        CaseType::MeetingRequest => &["purpose", "attendees", "time_window"],
        CaseType::StatusRequest => &["case_id"],
        CaseType::General => &[],
    }
}

fn is_schema_key(case_type: CaseType, key: &str) -> bool {
    COMMON_KEYS.contains(&key) || case_keys(case_type).contains(&key)
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction service returned HTTP {0}")]
    Status(u16),

    #[error("extraction service returned an unusable reply: {0}")]
    InvalidResponse(String),
}

/// Entities pulled from a request together with their provenance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    pub entities: Entities,
    pub tool_used: ToolUsed,
    pub flags: BTreeSet<String>,
    /// Why the preferred extractor was not used, if it was skipped
    pub failure: Option<String>,
}

impl Extraction {
    pub fn new(entities: Entities, tool_used: ToolUsed) -> Self {
        Self {
            entities,
            tool_used,
            flags: BTreeSet::new(),
            failure: None,
        }
    }
}

/// Summary and next-steps lines shown to the requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub summary: String,
    pub next_steps: String,
}

impl Narration {
    pub fn from_rules(text: &str, missing: &[String]) -> Self {
        Self {
            summary: summary(text),
            next_steps: next_steps(missing),
        }
    }
}

/// Capability for pulling entities out of request text
pub trait Extractor: Send + Sync {
    fn extract(&self, case_type: CaseType, text: &str) -> Result<Extraction, ExtractError>;

    /// One question covering every missing field, `None` when nothing is missing
    fn clarifying_question(&self, _case_type: CaseType, _text: &str, missing: &[String]) -> Option<String> {
        clarifying_question(missing)
    }

    fn narrate(&self, _case_type: CaseType, text: &str, missing: &[String]) -> Narration {
        Narration::from_rules(text, missing)
    }
}

/// Keep schema keys only and coerce loosely-typed values
///
/// Nulls and blank values are dropped rather than stored, so an absent key
/// always means "not provided".
pub fn normalize_entities(case_type: CaseType, raw: &Map<String, Value>) -> Entities {
    raw.iter()
        .filter(|(key, _)| is_schema_key(case_type, key))
        .filter_map(|(key, value)| {
            let coerced = if key == "people_affected" {
                coerce_count(value).map(|n| EntityValue::Text(n.to_string()))
            } else {
                coerce_value(value)
            };
            coerced.map(|v| (key.clone(), v))
        })
        .collect()
}

fn coerce_value(value: &Value) -> Option<EntityValue> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| EntityValue::from(s))
        }
        Value::Bool(_) | Value::Number(_) => Some(EntityValue::Text(value.to_string())),
        Value::Array(items) => {
            let items: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect();
            (!items.is_empty()).then_some(EntityValue::List(items))
        }
        Value::Object(_) => Some(EntityValue::Text(value.to_string())),
    }
}

fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::Array(items) => Some(items.len() as u64),
        Value::String(s) => {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Fill `people_affected` for access requests when the extractor left it out
///
/// Counts distinct email addresses in the text, or failing that the
/// comma-separated names in `requester_name`.
pub fn infer_people_affected(case_type: CaseType, text: &str, entities: &mut Entities) {
    if case_type != CaseType::AccessRequest {
        return;
    }
    let known = entities
        .get("people_affected")
        .and_then(EntityValue::as_text)
        .map_or(false, |n| n != "0");
    if known {
        return;
    }

    let emails = find_emails(text);
    let count = if !emails.is_empty() {
        emails.len()
    } else {
        entities
            .get("requester_name")
            .map(|names| {
                names
                    .to_display()
                    .split(',')
                    .filter(|part| !part.trim().is_empty())
                    .count()
            })
            .unwrap_or(0)
    };

    if count > 0 {
        entities.insert("people_affected".to_string(), EntityValue::Text(count.to_string()));
    }
}

//! Event shape validation
//!
//! Hard checks reject an event before it reaches the log. Case types are only
//! soft-checked: an unfamiliar type produces a warning, not a rejection.

use std::collections::HashSet;

use thiserror::Error;

use crate::types::{Entities, Event, EventPayload};

/// Case types known to the bundled classifier
pub const STANDARD_CASE_TYPES: &[&str] = &[
    "access_request",
    "security_incident",
    "meeting_request",
    "status_request",
    "general",
];

/// Longest accepted entity key
pub const MAX_ENTITY_KEY_LEN: usize = 64;

/// An event whose shape does not match the case log schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema error: {}", .violations.join("; "))]
pub struct SchemaError {
    pub violations: Vec<String>,
}

impl SchemaError {
    pub fn single(violation: impl Into<String>) -> Self {
        Self {
            violations: vec![violation.into()],
        }
    }
}

/// Decode an event from loosely-typed JSON, mapping any decode failure to `SchemaError`
pub fn event_from_value(value: serde_json::Value) -> Result<Event, SchemaError> {
    let event: Event =
        serde_json::from_value(value).map_err(|e| SchemaError::single(e.to_string()))?;
    validate_event(&event)?;
    Ok(event)
}

/// Check every hard constraint on an event, collecting all violations
pub fn validate_event(event: &Event) -> Result<(), SchemaError> {
    let mut violations = Vec::new();

    for flag in &event.audit.flags {
        if flag.trim().is_empty() {
            violations.push("audit.flags contains an empty flag".to_string());
        }
    }

    match &event.payload {
        EventPayload::CaseCreated(data) => {
            require_text("case_type", &data.case_type, &mut violations);
            require_text("routing", &data.routing, &mut violations);
            require_text("draft_response", &data.draft_response, &mut violations);
            check_entities("entities", &data.entities, &mut violations);
            check_field_list("missing_info", &data.missing_info, &mut violations);
        }
        EventPayload::FollowUp(data) => {
            check_entities("entities_update", &data.entities_update, &mut violations);
            check_field_list("missing_info_after", &data.missing_info_after, &mut violations);
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { violations })
    }
}

/// Check if case type is standard, return warning if not
pub fn validate_case_type(case_type: &str) -> Option<String> {
    if STANDARD_CASE_TYPES.iter().any(|&t| t == case_type) {
        None
    } else {
        Some(format!(
            "Non-standard case_type '{}'. Recommended: {:?}",
            case_type, STANDARD_CASE_TYPES
        ))
    }
}

/// Warn about a case created already past its SLA; backfilled cases are allowed
pub fn validate_sla_due(event: &Event) -> Option<String> {
    match &event.payload {
        EventPayload::CaseCreated(data) if data.sla_due < event.timestamp => Some(format!(
            "sla_due {} is earlier than the event timestamp {}",
            data.sla_due.to_rfc3339(),
            event.timestamp.to_rfc3339()
        )),
        _ => None,
    }
}

fn require_text(field: &str, value: &str, violations: &mut Vec<String>) {
    if value.trim().is_empty() {
        violations.push(format!("{} must not be empty", field));
    }
}

fn check_entities(field: &str, entities: &Entities, violations: &mut Vec<String>) {
    for key in entities.keys() {
        if key.trim().is_empty() {
            violations.push(format!("{} has an empty key", field));
        } else if key.len() > MAX_ENTITY_KEY_LEN {
            violations.push(format!("{} key '{}' is too long", field, key));
        } else if key.trim() != key || key.chars().any(char::is_control) {
            violations.push(format!("{} key '{}' has stray whitespace", field, key.escape_debug()));
        }
    }
}

fn check_field_list(field: &str, names: &[String], violations: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            violations.push(format!("{} contains an empty field name", field));
        } else if !seen.insert(name.as_str()) {
            violations.push(format!("{} lists '{}' twice", field, name));
        }
    }
}

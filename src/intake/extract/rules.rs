//! Deterministic rule-based extraction from labeled request lines

use crate::intake::planner::CaseType;
use crate::intake::text::{extract_case_id, extract_labeled_field};
use crate::types::{Entities, EntityValue, ToolUsed};

use super::{case_keys, ExtractError, Extraction, Extractor};

const LOCATION_LABELS: &[&str] = &[
    "department/program",
    "department",
    "program area",
    "program-area",
    "program",
    "location",
    "site",
    "branch",
];
const CONTACT_LABELS: &[&str] = &["contact", "email", "phone"];

fn labels_for(key: &str) -> &'static [&'static str] {
    match key {
        "requester_name" => &["name", "requester", "requested by"],
        "deadline" => &["deadline", "due", "due date"],
        "system_or_asset" => &["system or asset", "system", "asset", "application"],
        "access_level" => &["access level", "permission level", "role"],
        "people_affected" => &["people affected", "number of people"],
        "approver" => &["approver", "approved by", "manager"],
        "what_happened" => &["what happened", "description", "details"],
        "when_happened" => &["when happened", "when", "date"],
        "affected_system" => &["affected system", "system affected", "system"],
        "reporter_contact" => &["reporter contact", "reporter", "contact", "email", "phone"],
        "purpose" => &["purpose", "topic", "subject", "agenda"],
        "attendees" => &["attendees", "participants", "invitees"],
        "time_window" => &["time window", "preferred time", "time", "when"],
        _ => &[],
    }
}

/// Extractor that reads `Label: value` lines and case ids from the text
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn entities(&self, case_type: CaseType, text: &str) -> Entities {
        let mut entities = Entities::new();

        if let Some(location) = extract_labeled_field(text, LOCATION_LABELS) {
            entities.insert("location_or_program".to_string(), EntityValue::Text(location));
        }
        if let Some(contact) = extract_labeled_field(text, CONTACT_LABELS) {
            entities.insert("requester_contact".to_string(), EntityValue::Text(contact));
        }
        for key in ["requester_name", "deadline"] {
            if let Some(value) = extract_labeled_field(text, labels_for(key)) {
                entities.insert(key.to_string(), EntityValue::Text(value));
            }
        }

        for key in case_keys(case_type) {
            if *key == "case_id" {
                if let Some(id) = extract_case_id(text) {
                    entities.insert("case_id".to_string(), EntityValue::Text(id.into()));
                }
                continue;
            }
            let Some(value) = extract_labeled_field(text, labels_for(key)) else {
                continue;
            };
            let value = if *key == "attendees" {
                EntityValue::List(
                    value
                        .split([',', ';'])
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                )
            } else {
                EntityValue::Text(value)
            };
            if !value.is_blank() {
                entities.insert(key.to_string(), value);
            }
        }

        entities
    }
}

impl Extractor for RuleBasedExtractor {
    fn extract(&self, case_type: CaseType, text: &str) -> Result<Extraction, ExtractError> {
        Ok(Extraction::new(self.entities(case_type, text), ToolUsed::Rules))
    }
}

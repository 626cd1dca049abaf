//! Deterministic text rules used while building case events
//!
//! Everything here is a pure function of its inputs: priority, SLA, routing,
//! required fields, missing-field detection and the canned response text.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{CaseId, Entities, Priority};

use super::planner::{CaseType, Plan};

const SMART_PUNCTUATION: &[(char, &str)] = &[
    ('\u{201c}', "\""),
    ('\u{201d}', "\""),
    ('\u{2019}', "'"),
    ('\u{2018}', "'"),
    ('\u{2014}', "-"),
    ('\u{2013}', "-"),
];

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("literal pattern compiles"))
}

/// Normalize quotes, dashes, line endings and runs of whitespace
pub fn clean_text(raw: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

    let mut s = raw.to_string();
    for (from, to) in SMART_PUNCTUATION {
        s = s.replace(*from, to);
    }
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = cached(&SPACES, r"[ \t]+").replace_all(&s, " ");
    let s = cached(&BLANK_LINES, r"\n{3,}").replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// True when the text asks about progress rather than adding information
///
/// Keywords match whole words only, so "details" or "beta" never read as "eta".
pub fn is_status_intent(text: &str) -> bool {
    static STATUS: OnceLock<Regex> = OnceLock::new();
    cached(
        &STATUS,
        r"(?i)\b(status|progress|update|where is|how long|how many days|eta|time remaining|sla)\b",
    )
    .is_match(text)
}

const CRITICAL_WORDS: &[&str] = &["outage", "breach", "ransomware", "system down", "emergency", "data leak"];
const HIGH_WORDS: &[&str] = &["urgent", "asap", "immediately", "today"];
const NORMAL_WORDS: &[&str] = &["this week", "by friday", "deadline", "next week"];

pub fn priority_from_text(text: &str) -> Priority {
    let lowered = text.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

    if hit(CRITICAL_WORDS) {
        Priority::Critical
    } else if hit(HIGH_WORDS) {
        Priority::High
    } else if hit(NORMAL_WORDS) {
        Priority::Normal
    } else {
        Priority::Low
    }
}

/// Days until the SLA is due
pub fn sla_days(case_type: CaseType, priority: Priority) -> i64 {
    match (case_type, priority) {
        (CaseType::StatusRequest, Priority::High | Priority::Critical) => 2,
        (CaseType::StatusRequest, _) => 5,
        (CaseType::SecurityIncident, Priority::High | Priority::Critical) => 1,
        (CaseType::SecurityIncident, Priority::Normal) => 2,
        (CaseType::SecurityIncident, Priority::Low) => 5,
        (_, Priority::Critical) => 1,
        (_, Priority::High) => 2,
        (_, Priority::Normal) => 10,
        (_, Priority::Low) => 15,
    }
}

/// Work queue a new case is routed to
pub fn routing_queue(case_type: CaseType) -> &'static str {
    match case_type {
        CaseType::AccessRequest => "ServiceDesk-Access",
        CaseType::SecurityIncident => "Security-Incident",
        CaseType::MeetingRequest => "Admin-Scheduling",
        CaseType::StatusRequest => "Case-Tracking",
        CaseType::General => "General-Intake",
    }
}

fn base_required(case_type: CaseType) -> &'static [&'static str] {
    match case_type {
        CaseType::General => &["location_or_program"],
        CaseType::AccessRequest => &["requester_contact", "location_or_program", "system_or_asset", "access_level"],
        CaseType::SecurityIncident => &[
            "reporter_contact",
            "location_or_program",
            "what_happened",
            "when_happened",
            "affected_system",
        ],
        CaseType::MeetingRequest => &["requester_contact", "location_or_program", "purpose", "attendees", "time_window"],
        CaseType::StatusRequest => &["case_id"],
    }
}

/// Base fields for the case type followed by any extra fields from the plan
pub fn required_fields(case_type: CaseType, plan: &Plan) -> Vec<String> {
    let mut fields: Vec<String> = base_required(case_type).iter().map(|s| s.to_string()).collect();
    for field in &plan.required_fields {
        if !fields.contains(field) {
            fields.push(field.clone());
        }
    }
    fields
}

/// First well-formed case id mentioned in the text
pub fn extract_case_id(text: &str) -> Option<CaseId> {
    static CASE_ID: OnceLock<Regex> = OnceLock::new();
    cached(&CASE_ID, r"\bCASE-\d{8}-\d{6}\b")
        .find_iter(text)
        .find_map(|m| CaseId::parse(m.as_str()).ok())
}

/// Value of the first `Label: value` line matching one of `labels`
///
/// Labels are tried in order and matched case-insensitively; `=` and `-`
/// are accepted as separators too.
pub fn extract_labeled_field(text: &str, labels: &[&str]) -> Option<String> {
    labels
        .iter()
        .find_map(|label| text.lines().find_map(|line| labeled_value(line, label)))
}

fn labeled_value(line: &str, label: &str) -> Option<String> {
    static SEPARATOR_VALUE: OnceLock<Regex> = OnceLock::new();

    let line = line.trim_start();
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    cached(&SEPARATOR_VALUE, r"^\s*[:=\-]\s*(.*?)\s*$")
        .captures(&line[label.len()..])
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|v| !v.is_empty())
}

/// Distinct email addresses in the text, in order of first appearance
pub fn find_emails(text: &str) -> Vec<String> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let mut seen = HashSet::new();
    cached(&EMAIL, r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|e| seen.insert(e.to_lowercase()))
        .collect()
}

/// Required fields that are absent, empty, or "unknown"
pub fn find_missing(required: &[String], entities: &Entities) -> Vec<String> {
    required
        .iter()
        .filter(|field| entities.get(*field).map_or(true, |v| v.is_blank()))
        .cloned()
        .collect()
}

fn field_phrase(field: &str) -> Option<&'static str> {
    Some(match field {
        "location_or_program" => "which department or program area this relates to",
        "requester_contact" => "the best contact email or phone number",
        "reporter_contact" => "the best contact for whoever reported this",
        "deadline" => "any deadline or event date",
        "system_or_asset" => "which system or asset you need access to",
        "access_level" => "what access level you require",
        "people_affected" => "how many people need this access",
        "approver" => "who will approve the request",
        "what_happened" => "what happened",
        "when_happened" => "when it happened",
        "affected_system" => "which system was affected",
        "purpose" => "the purpose of the meeting/request",
        "attendees" => "who should attend",
        "time_window" => "your preferred time window",
        "case_id" => "your case ID",
        _ => return None,
    })
}

/// One question covering every missing field, or `None` when nothing is missing
pub fn clarifying_question(missing: &[String]) -> Option<String> {
    if missing.is_empty() {
        return None;
    }

    let phrases: Vec<&str> = missing.iter().filter_map(|f| field_phrase(f)).collect();
    let unphrased: Vec<&str> = missing
        .iter()
        .filter(|f| field_phrase(f).is_none())
        .map(String::as_str)
        .collect();

    let question = match (phrases.as_slice(), unphrased.is_empty()) {
        ([], _) => format!("To route this correctly, could you provide: {}?", missing.join(", ")),
        ([only], true) => format!("Could you confirm {}?", only),
        ([rest @ .., last], true) => {
            format!("To route this correctly, could you confirm {}, and {}?", rest.join(", "), last)
        }
        (parts, false) => format!(
            "To route this correctly, could you confirm {} and also provide: {}?",
            parts.join(", "),
            unphrased.join(", ")
        ),
    };
    Some(question)
}

const SUMMARY_CHARS: usize = 180;

/// Short summary line of the request text
pub fn summary(text: &str) -> String {
    let cleaned = clean_text(text);
    let mut chars = cleaned.chars();
    let head: String = chars.by_ref().take(SUMMARY_CHARS).collect();
    let ellipsis = if chars.next().is_some() { "..." } else { "" };
    format!("Summary: {}{}", head, ellipsis)
}

pub fn next_steps(missing: &[String]) -> String {
    if missing.is_empty() {
        "Next steps: your request can be routed for processing.".to_string()
    } else {
        format!("Next steps: provide {}.", missing.join(", "))
    }
}

/// Acknowledgement sent back to the requester
pub fn draft_response(case_type: CaseType, missing: &[String]) -> String {
    match (case_type, missing.is_empty()) {
        (CaseType::StatusRequest, false) => "Thanks for checking in. Please share your case ID \
             (example: CASE-YYYYMMDD-HHMMSS) so we can confirm the current status."
            .to_string(),
        (CaseType::StatusRequest, true) => {
            "Thanks for checking in. We will review the current status and provide an update.".to_string()
        }
        (_, true) => "Thanks for your request. It has been received and will be processed \
             according to the applicable service standard."
            .to_string(),
        (_, false) => format!(
            "Thanks for your request. To proceed, please provide the following details: {}.",
            missing.join(", ")
        ),
    }
}

/// Strip Markdown code fences from a model reply
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim().replace("```json", "").replace("```", "").trim().to_string()
}

//! Assembly of case events from an extraction
//!
//! A `case_created` event carries the full case packet; a `follow_up` only
//! the keys supplied this time plus the recomputed missing fields. The
//! clarifying question and summary lines come from the extractor, which may
//! hand them to an outside service.

use chrono::{DateTime, FixedOffset};

use crate::types::{Audit, CaseCreatedData, CaseId, CaseState, Event, FollowUpData};
use crate::utils::add_days;

use super::extract::{Extraction, Extractor};
use super::planner::CaseType;
use super::text::{draft_response, find_missing, priority_from_text, routing_queue, sla_days};

fn audit_for(extraction: &Extraction, note: &str) -> Audit {
    let mut audit = Audit::new(extraction.tool_used);
    audit.flags = extraction.flags.clone();
    let notes = match &extraction.failure {
        Some(failure) => format!("{}; external extraction failed: {}", note, failure),
        None => note.to_string(),
    };
    audit.with_notes(notes)
}

/// Build the `case_created` event for a new case
///
/// `text` is the cleaned request text; `required` the effective required
/// fields for `case_type`.
pub fn case_created_event(
    case_id: CaseId,
    at: DateTime<FixedOffset>,
    case_type: CaseType,
    text: &str,
    extraction: &Extraction,
    required: &[String],
    writer: &dyn Extractor,
) -> Event {
    let priority = priority_from_text(text);
    let missing_info = find_missing(required, &extraction.entities);
    let narration = writer.narrate(case_type, text, &missing_info);

    Event::case_created(
        case_id,
        at,
        CaseCreatedData {
            case_type: case_type.to_string(),
            entities: extraction.entities.clone(),
            routing: routing_queue(case_type).to_string(),
            priority,
            sla_due: add_days(&at, sla_days(case_type, priority)),
            draft_response: draft_response(case_type, &missing_info),
            request_text: Some(text.to_string()),
            summary: Some(narration.summary),
            next_steps: Some(narration.next_steps),
            clarifying_question: writer.clarifying_question(case_type, text, &missing_info),
            missing_info,
        },
        audit_for(extraction, "case packet created"),
    )
}

/// Build the `follow_up` event for an existing case
///
/// Missing fields are recomputed against the entities the case will have
/// once this update is merged.
pub fn follow_up_event(
    state: &CaseState,
    case_type: CaseType,
    at: DateTime<FixedOffset>,
    text: &str,
    extraction: &Extraction,
    required: &[String],
    writer: &dyn Extractor,
) -> Event {
    let mut merged = state.entities.clone();
    merged.extend(extraction.entities.clone());
    let missing_info_after = find_missing(required, &merged);
    let narration = writer.narrate(case_type, text, &missing_info_after);

    Event::follow_up(
        state.case_id.clone(),
        at,
        FollowUpData {
            entities_update: extraction.entities.clone(),
            message: Some(text.to_string()),
            summary: Some(narration.summary),
            next_steps: Some(narration.next_steps),
            clarifying_question: writer.clarifying_question(case_type, text, &missing_info_after),
            missing_info_after,
        },
        audit_for(extraction, "follow-up appended"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::replay;
    use crate::intake::extract::{ExtractError, ExternalNlpExtractor, NlpBackend, RuleBasedExtractor};
    use crate::types::{EntityValue, EventPayload, Entities, Priority, ToolUsed, FLAG_EXTERNAL_NLP_FAILED};

    fn at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-01-14T09:30:12-05:00").unwrap()
    }

    fn id() -> CaseId {
        CaseId::parse("CASE-20250114-093012").unwrap()
    }

    fn extraction(pairs: &[(&str, &str)]) -> Extraction {
        let entities: Entities = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), EntityValue::from(*v)))
            .collect();
        Extraction::new(entities, ToolUsed::Rules)
    }

    fn required(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_case_created_packet() {
        let event = case_created_event(
            id(),
            at(),
            CaseType::SecurityIncident,
            "Phishing email received, urgent",
            &extraction(&[("what_happened", "phishing")]),
            &required(&["what_happened", "when_happened"]),
            &RuleBasedExtractor::new(),
        );

        let EventPayload::CaseCreated(data) = &event.payload else {
            panic!("expected case_created");
        };
        assert_eq!(data.case_type, "security_incident");
        assert_eq!(data.routing, "Security-Incident");
        assert_eq!(data.priority, Priority::High);
        assert_eq!(data.sla_due.to_rfc3339(), "2025-01-15T09:30:12-05:00");
        assert_eq!(data.missing_info, vec!["when_happened".to_string()]);
        assert_eq!(data.clarifying_question.as_deref(), Some("Could you confirm when it happened?"));
        assert!(data.draft_response.contains("when_happened"));
        assert_eq!(data.summary.as_deref(), Some("Summary: Phishing email received, urgent"));
        assert_eq!(data.next_steps.as_deref(), Some("Next steps: provide when_happened."));
        assert_eq!(event.audit.notes.as_deref(), Some("case packet created"));
    }

    #[test]
    fn test_follow_up_recomputes_missing_against_merged_state() {
        let created = case_created_event(
            id(),
            at(),
            CaseType::MeetingRequest,
            "Schedule a meeting",
            &extraction(&[("purpose", "Budget")]),
            &required(&["purpose", "attendees", "time_window"]),
            &RuleBasedExtractor::new(),
        );
        let state = replay(&id(), vec![created]).unwrap();

        let event = follow_up_event(
            &state,
            CaseType::MeetingRequest,
            at(),
            "Attendees: Ana",
            &extraction(&[("attendees", "Ana")]),
            &required(&["purpose", "attendees", "time_window"]),
            &RuleBasedExtractor::new(),
        );

        let EventPayload::FollowUp(data) = &event.payload else {
            panic!("expected follow_up");
        };
        assert_eq!(data.entities_update.len(), 1);
        assert_eq!(data.missing_info_after, vec!["time_window".to_string()]);
        assert_eq!(data.message.as_deref(), Some("Attendees: Ana"));
        assert_eq!(data.next_steps.as_deref(), Some("Next steps: provide time_window."));
        assert_eq!(
            data.clarifying_question.as_deref(),
            Some("Could you confirm your preferred time window?")
        );
    }

    #[test]
    fn test_failed_external_extraction_is_audited() {
        let mut extraction = extraction(&[]);
        extraction.flags.insert(FLAG_EXTERNAL_NLP_FAILED.to_string());
        extraction.failure = Some("timeout".to_string());

        let event = case_created_event(
            id(),
            at(),
            CaseType::General,
            "hi",
            &extraction,
            &[],
            &RuleBasedExtractor::new(),
        );
        assert!(event.audit.flags.contains(FLAG_EXTERNAL_NLP_FAILED));
        assert!(event.audit.notes.unwrap().contains("timeout"));
    }

    struct DownBackend;

    impl NlpBackend for DownBackend {
        fn complete(&self, _prompt: &str) -> Result<String, ExtractError> {
            Err(ExtractError::Status(503))
        }
    }

    #[test]
    fn test_unreachable_writer_uses_rule_wording() {
        let required = required(&["purpose", "attendees"]);
        let extraction = extraction(&[("purpose", "Budget")]);
        let with = |writer: &dyn Extractor| {
            case_created_event(
                id(),
                at(),
                CaseType::MeetingRequest,
                "Schedule a budget meeting",
                &extraction,
                &required,
                writer,
            )
        };

        let down = with(&ExternalNlpExtractor::new(DownBackend));
        let rules = with(&RuleBasedExtractor::new());
        let (EventPayload::CaseCreated(down), EventPayload::CaseCreated(rules)) = (down.payload, rules.payload)
        else {
            panic!("expected case_created");
        };
        assert_eq!(down.summary, rules.summary);
        assert_eq!(down.next_steps, rules.next_steps);
        assert_eq!(down.clarifying_question, rules.clarifying_question);
        assert_eq!(down.clarifying_question.as_deref(), Some("Could you confirm who should attend?"));
    }
}

//! Intake agent: plan, extract, and record one request
//!
//! ```text
//! request text ──► clean ──► plan ──► referenced case id?
//!                                      │
//!          ┌──────────── exists ───────┴────── absent ─────────┐
//!          ▼                                                   ▼
//!   status intent and ── yes ──► replay (read-only)     case_created
//!   no labeled fields?                                   (fresh CaseId)
//!          │ no
//!          ▼
//!      follow_up
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NlpConfig;
use crate::event_store::{CaseStore, StoreError};
use crate::types::{CaseId, CaseState, Event, EventPayload};
use crate::utils;

use super::extract::{
    infer_people_affected, ExternalNlpExtractor, ExtractError, Extraction, Extractor, HttpNlpBackend,
    Narration, RuleBasedExtractor,
};
use super::packet::{case_created_event, follow_up_event};
use super::planner::{plan_request, CaseType, Plan};
use super::text::{clean_text, extract_case_id, is_status_intent, required_fields};

/// Attempts at claiming a fresh case id before giving up
const MAX_CREATE_ATTEMPTS: u32 = 10;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("request text is empty")]
    EmptyRequest,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// What the agent did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    CaseCreated,
    FollowUp,
    /// Read-only; nothing was appended
    StatusCheck,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub kind: OutcomeKind,
    pub case_id: CaseId,
    pub plan: Plan,
    /// The appended event, absent for status checks
    pub event: Option<Event>,
    /// Case state after the request was handled
    pub state: CaseState,
    /// Message to show the requester
    pub message: String,
    pub summary: String,
    pub next_steps: String,
}

pub struct IntakeAgent {
    store: Arc<CaseStore>,
    extractor: Box<dyn Extractor>,
}

impl IntakeAgent {
    pub fn new(store: Arc<CaseStore>, extractor: Box<dyn Extractor>) -> Self {
        Self { store, extractor }
    }

    /// Agent using only the rule-based extractor
    pub fn with_rules(store: Arc<CaseStore>) -> Self {
        Self::new(store, Box::new(RuleBasedExtractor::new()))
    }

    /// External extraction when configured, rules otherwise
    pub fn from_config(store: Arc<CaseStore>, nlp: Option<NlpConfig>) -> Self {
        match nlp {
            Some(config) => {
                info!(url = %config.url, model = %config.model, "external extraction enabled");
                Self::new(store, Box::new(ExternalNlpExtractor::new(HttpNlpBackend::new(config))))
            }
            None => Self::with_rules(store),
        }
    }

    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    /// Handle one request at the current time
    pub fn run(&self, request_text: &str) -> Result<IntakeOutcome, IntakeError> {
        self.run_at(request_text, utils::now())
    }

    /// Handle one request as if received at `now`
    pub fn run_at(
        &self,
        request_text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let text = clean_text(request_text);
        if text.is_empty() {
            return Err(IntakeError::EmptyRequest);
        }

        let plan = plan_request(&text);

        if let Some(case_id) = extract_case_id(&text) {
            if self.store.exists(&case_id)? {
                let current = self.store.get_state(&case_id)?;
                // Follow-ups are judged against the case's own type, not the new text
                let case_type = current.case_type.parse().unwrap_or_default();
                return if is_status_intent(&text) && !adds_labeled_fields(case_type, &text) {
                    self.status_check(case_id, plan)
                } else {
                    self.follow_up(current, case_type, &text, now)
                };
            }
        }

        self.create(plan, &text, now)
    }

    fn status_check(&self, case_id: CaseId, plan: Plan) -> Result<IntakeOutcome, IntakeError> {
        let replay = self.store.replay_case(&case_id)?;
        if !replay.corrupt_records.is_empty() {
            warn!(
                case_id = %case_id,
                corrupt = replay.corrupt_records.len(),
                "status check replayed past corrupt records"
            );
        }
        info!(case_id = %case_id, "status check");

        Ok(IntakeOutcome {
            kind: OutcomeKind::StatusCheck,
            message: format!("Status for case {} is shown below.", case_id),
            summary: format!("Summary: Status check requested for case {}.", case_id),
            next_steps: format!(
                "Next steps: This case is being processed and is due by {}.",
                replay.state.sla_due.format("%Y-%m-%d %H:%M %:z")
            ),
            case_id,
            plan,
            event: None,
            state: replay.state,
        })
    }

    fn follow_up(
        &self,
        current: CaseState,
        case_type: CaseType,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let case_id = current.case_id.clone();
        let plan = Plan::for_case_type(case_type);

        let extraction = self.extract(case_type, text)?;
        let required = required_fields(case_type, &plan);
        let event = follow_up_event(
            &current,
            case_type,
            now,
            text,
            &extraction,
            &required,
            self.extractor.as_ref(),
        );
        self.store.append(&event)?;

        let state = self.store.get_state(&case_id)?;
        info!(case_id = %case_id, missing = state.missing_info.len(), "follow-up recorded");
        let Narration { summary, next_steps } = recorded_narration(&event, text, &state.missing_info);

        Ok(IntakeOutcome {
            kind: OutcomeKind::FollowUp,
            message: format!("Thanks, we've added this information to your existing case {}.", case_id),
            summary,
            next_steps,
            case_id,
            plan,
            event: Some(event),
            state,
        })
    }

    fn create(
        &self,
        plan: Plan,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let case_type = plan.case_type;
        let extraction = self.extract(case_type, text)?;
        let required = required_fields(case_type, &plan);

        let mut attempt = 0;
        let event = loop {
            attempt += 1;
            let case_id = self.store.next_case_id(&now)?;
            let event = case_created_event(
                case_id,
                now,
                case_type,
                text,
                &extraction,
                &required,
                self.extractor.as_ref(),
            );
            match self.store.append(&event) {
                Ok(()) => break event,
                // Another writer claimed the same second between our read and append
                Err(StoreError::CaseAlreadyExists(id)) if attempt < MAX_CREATE_ATTEMPTS => {
                    warn!(case_id = %id, attempt, "case id taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let case_id = event.case_id.clone();
        let state = self.store.get_state(&case_id)?;
        info!(case_id = %case_id, case_type = %case_type, priority = %state.priority, "case created");
        let Narration { summary, next_steps } = recorded_narration(&event, text, &state.missing_info);

        Ok(IntakeOutcome {
            kind: OutcomeKind::CaseCreated,
            message: state.draft_response.clone(),
            summary,
            next_steps,
            case_id,
            plan,
            event: Some(event),
            state,
        })
    }

    fn extract(&self, case_type: CaseType, text: &str) -> Result<Extraction, IntakeError> {
        let mut extraction = self.extractor.extract(case_type, text)?;
        infer_people_affected(case_type, text, &mut extraction.entities);
        Ok(extraction)
    }
}

/// True when the text carries `Label: value` lines for the case type
fn adds_labeled_fields(case_type: CaseType, text: &str) -> bool {
    RuleBasedExtractor::new()
        .entities(case_type, text)
        .keys()
        .any(|key| key != "case_id")
}

/// Summary lines stored on the event, with the rule wording for any gap
fn recorded_narration(event: &Event, text: &str, missing: &[String]) -> Narration {
    let (summary, next_steps) = match &event.payload {
        EventPayload::CaseCreated(data) => (data.summary.clone(), data.next_steps.clone()),
        EventPayload::FollowUp(data) => (data.summary.clone(), data.next_steps.clone()),
    };
    let rules = Narration::from_rules(text, missing);
    Narration {
        summary: summary.unwrap_or(rules.summary),
        next_steps: next_steps.unwrap_or(rules.next_steps),
    }
}

/// Time until the SLA is due, negative when overdue
pub fn sla_remaining(state: &CaseState, now: DateTime<FixedOffset>) -> Duration {
    state.sla_due.signed_duration_since(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::StoreConfig;
    use crate::types::{EntityValue, EventPayload, EventType, ToolUsed, FLAG_EXTERNAL_NLP_FAILED};
    use crate::intake::extract::NlpBackend;
    use tempfile::TempDir;

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn create_test_agent() -> (IntakeAgent, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = CaseStore::open(&StoreConfig::new(temp_dir.path())).unwrap();
        (IntakeAgent::with_rules(Arc::new(store)), temp_dir)
    }

    #[test]
    fn test_new_request_creates_case() {
        let (agent, _temp_dir) = create_test_agent();
        let outcome = agent
            .run_at(
                "Please grant access to the finance shared drive\nContact: ana@x.org",
                at("2025-01-14T09:30:12-05:00"),
            )
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::CaseCreated);
        assert_eq!(outcome.case_id.as_str(), "CASE-20250114-093012");
        assert_eq!(outcome.plan.case_type, CaseType::AccessRequest);
        assert_eq!(outcome.state.routing, "ServiceDesk-Access");
        assert_eq!(outcome.state.entities["people_affected"], EntityValue::from("1"));
        assert!(outcome.state.missing_info.contains(&"approver".to_string()));
        assert_eq!(outcome.message, outcome.state.draft_response);
    }

    #[test]
    fn test_same_second_requests_get_distinct_ids() {
        let (agent, _temp_dir) = create_test_agent();
        let now = at("2025-01-14T09:30:12+00:00");

        let first = agent.run_at("Hello, a general question", now).unwrap();
        let second = agent.run_at("Another general question", now).unwrap();

        assert_eq!(first.case_id.as_str(), "CASE-20250114-093012");
        assert_eq!(second.case_id.as_str(), "CASE-20250114-093013");
    }

    #[test]
    fn test_follow_up_merges_into_existing_case() {
        let (agent, _temp_dir) = create_test_agent();
        let created = agent
            .run_at("Schedule a meeting\nPurpose: Budget", at("2025-01-14T09:30:12+00:00"))
            .unwrap();

        let text = format!("{}\nAttendees: Ana, Bo\nTime window: Friday 2-4pm", created.case_id);
        let outcome = agent.run_at(&text, at("2025-01-15T10:00:00+00:00")).unwrap();

        assert_eq!(outcome.kind, OutcomeKind::FollowUp);
        assert_eq!(outcome.case_id, created.case_id);
        assert_eq!(outcome.plan.case_type, CaseType::MeetingRequest);
        assert_eq!(outcome.state.event_count, 2);
        assert_eq!(outcome.state.last_event_type, EventType::FollowUp);
        assert_eq!(outcome.state.entities["purpose"], EntityValue::from("Budget"));
        assert!(!outcome.state.missing_info.contains(&"attendees".to_string()));
        assert!(!outcome.state.missing_info.contains(&"time_window".to_string()));
        // Fixed at creation
        assert_eq!(outcome.state.routing, created.state.routing);
        assert_eq!(outcome.state.sla_due, created.state.sla_due);
    }

    #[test]
    fn test_status_check_is_read_only() {
        let (agent, _temp_dir) = create_test_agent();
        let created = agent
            .run_at("Report a phishing incident", at("2025-01-14T09:30:12+00:00"))
            .unwrap();

        let text = format!("What is the status of {}?", created.case_id);
        let outcome = agent.run_at(&text, at("2025-01-14T12:00:00+00:00")).unwrap();

        assert_eq!(outcome.kind, OutcomeKind::StatusCheck);
        assert!(outcome.event.is_none());
        assert_eq!(outcome.state, created.state);
        assert_eq!(agent.store().read_all().unwrap().count(), 1);
    }

    #[test]
    fn test_reply_with_details_is_a_follow_up() {
        let (agent, _temp_dir) = create_test_agent();
        let created = agent
            .run_at("Schedule a meeting\nPurpose: Budget", at("2025-01-14T09:30:12+00:00"))
            .unwrap();

        let text = format!("{}\nHere are the details you asked for\nAttendees: Ana, Bo", created.case_id);
        let outcome = agent.run_at(&text, at("2025-01-14T11:00:00+00:00")).unwrap();

        assert_eq!(outcome.kind, OutcomeKind::FollowUp);
        assert_eq!(outcome.state.event_count, 2);
        assert!(!outcome.state.missing_info.contains(&"attendees".to_string()));
    }

    #[test]
    fn test_status_question_with_new_fields_is_recorded() {
        let (agent, _temp_dir) = create_test_agent();
        let created = agent
            .run_at("Schedule a meeting\nPurpose: Budget", at("2025-01-14T09:30:12+00:00"))
            .unwrap();

        let text = format!("Any update on {}?\nTime window: Friday 2-4pm", created.case_id);
        let outcome = agent.run_at(&text, at("2025-01-14T11:00:00+00:00")).unwrap();

        assert_eq!(outcome.kind, OutcomeKind::FollowUp);
        assert_eq!(outcome.state.entities["time_window"], EntityValue::from("Friday 2-4pm"));
    }

    #[test]
    fn test_outcome_wording_matches_recorded_event() {
        let (agent, _temp_dir) = create_test_agent();
        let outcome = agent
            .run_at("Schedule a meeting\nPurpose: Budget", at("2025-01-14T09:30:12+00:00"))
            .unwrap();

        let Some(EventPayload::CaseCreated(data)) = outcome.event.as_ref().map(|e| &e.payload) else {
            panic!("expected case_created");
        };
        assert_eq!(data.summary.as_deref(), Some(outcome.summary.as_str()));
        assert_eq!(data.next_steps.as_deref(), Some(outcome.next_steps.as_str()));
        assert!(outcome.next_steps.contains("attendees"));
    }

    #[test]
    fn test_unknown_case_id_opens_new_case() {
        let (agent, _temp_dir) = create_test_agent();
        let outcome = agent
            .run_at(
                "Status of CASE-20200101-000000 please",
                at("2025-01-14T09:30:12+00:00"),
            )
            .unwrap();

        assert_eq!(outcome.kind, OutcomeKind::CaseCreated);
        assert_eq!(outcome.plan.case_type, CaseType::StatusRequest);
        assert_eq!(
            outcome.state.entities["case_id"],
            EntityValue::from("CASE-20200101-000000")
        );
        assert!(outcome.state.missing_info.is_empty());
    }

    #[test]
    fn test_empty_request_rejected() {
        let (agent, _temp_dir) = create_test_agent();
        assert!(matches!(agent.run("  \r\n\t "), Err(IntakeError::EmptyRequest)));
        assert!(!agent.store().log().path().exists());
    }

    struct DownBackend;

    impl NlpBackend for DownBackend {
        fn complete(&self, _prompt: &str) -> Result<String, ExtractError> {
            Err(ExtractError::Status(503))
        }
    }

    #[test]
    fn test_extractor_fallback_is_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(CaseStore::open(&StoreConfig::new(temp_dir.path())).unwrap());
        let agent = IntakeAgent::new(store, Box::new(ExternalNlpExtractor::new(DownBackend)));

        let outcome = agent
            .run_at("Please grant folder access", at("2025-01-14T09:30:12+00:00"))
            .unwrap();
        let event = outcome.event.unwrap();

        assert_eq!(event.audit.tool_used, ToolUsed::Rules);
        assert!(event.audit.flags.contains(FLAG_EXTERNAL_NLP_FAILED));
        let EventPayload::CaseCreated(data) = &event.payload else {
            panic!("expected case_created");
        };
        // Question and summary fall back to the rule wording too
        assert_eq!(data.summary.as_deref(), Some("Summary: Please grant folder access"));
        assert_eq!(
            data.clarifying_question,
            crate::intake::text::clarifying_question(&outcome.state.missing_info)
        );
        assert_eq!(outcome.summary, "Summary: Please grant folder access");
    }

    #[test]
    fn test_sla_remaining() {
        let (agent, _temp_dir) = create_test_agent();
        let outcome = agent
            .run_at("urgent: general question", at("2025-01-14T09:30:12+00:00"))
            .unwrap();

        let remaining = sla_remaining(&outcome.state, at("2025-01-15T09:30:12+00:00"));
        assert_eq!(remaining, Duration::days(1));
    }
}

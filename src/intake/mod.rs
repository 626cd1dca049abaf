//! Intake pipeline
//!
//! Turns a free-text (or form) request into at most one appended event:
//! - `planner`: case type, steps and required fields
//! - `text`: deterministic priority, SLA, routing and response rules
//! - `extract`: entity extraction and requester-facing wording behind the `Extractor` trait
//! - `packet`: event assembly
//! - `agent`: the end-to-end flow against a `CaseStore`

pub mod agent;
pub mod extract;
pub mod form;
pub mod packet;
pub mod planner;
pub mod text;

pub use agent::{sla_remaining, IntakeAgent, IntakeError, IntakeOutcome, OutcomeKind};
pub use extract::{
    ExternalNlpExtractor, ExtractError, Extraction, Extractor, HttpNlpBackend, Narration,
    NlpBackend, RuleBasedExtractor,
};
pub use form::IntakeRequest;
pub use planner::{classify, plan_request, CaseType, Plan};

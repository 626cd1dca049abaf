//! External NLP extraction with rule-based fallback
//!
//! The backend is a completion endpoint in the Ollama `/api/generate`
//! shape: the prompt goes out, the model's text comes back in the `response`
//! field. Entity extraction asks for a JSON object; the clarifying question
//! and the summary lines are plain text. Any failure falls back to the
//! rules, and a failed extraction is recorded in the extraction flags.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::NlpConfig;
use crate::intake::planner::CaseType;
use crate::intake::text::{clarifying_question, clean_text, strip_code_fences};
use crate::types::{ToolUsed, FLAG_EXTERNAL_NLP_FAILED};

use super::{
    case_keys, normalize_entities, ExtractError, Extraction, Extractor, Narration, RuleBasedExtractor,
    COMMON_KEYS,
};

/// A text completion service
pub trait NlpBackend: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, ExtractError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Blocking HTTP backend
///
/// Must be called off the async runtime (e.g. from `spawn_blocking`).
#[derive(Debug, Clone)]
pub struct HttpNlpBackend {
    config: NlpConfig,
}

impl HttpNlpBackend {
    pub fn new(config: NlpConfig) -> Self {
        Self { config }
    }
}

impl NlpBackend for HttpNlpBackend {
    fn complete(&self, prompt: &str) -> Result<String, ExtractError> {
        // A blocking client owns an internal runtime; keep it scoped to the
        // calling blocking thread
        let client = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .build()?;

        let response = client
            .post(&self.config.url)
            .json(&GenerateRequest {
                model: &self.config.model,
                prompt,
                stream: false,
                format: "json",
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json()?;
        Ok(body.response)
    }
}

/// Extractor backed by an external service
///
/// Only access, security and meeting requests are sent out; other case types
/// go straight to the rules. Labeled lines the service missed are filled in
/// from the rules.
pub struct ExternalNlpExtractor<B: NlpBackend = HttpNlpBackend> {
    backend: B,
    rules: RuleBasedExtractor,
}

impl<B: NlpBackend> ExternalNlpExtractor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            rules: RuleBasedExtractor::new(),
        }
    }

    fn ask(&self, case_type: CaseType, text: &str) -> Result<Map<String, Value>, ExtractError> {
        let reply = self.backend.complete(&build_prompt(case_type, text))?;
        parse_json_object(&reply)
            .ok_or_else(|| ExtractError::InvalidResponse(excerpt(&reply)))
    }
}

fn uses_backend(case_type: CaseType) -> bool {
    matches!(
        case_type,
        CaseType::AccessRequest | CaseType::SecurityIncident | CaseType::MeetingRequest
    )
}

impl<B: NlpBackend> Extractor for ExternalNlpExtractor<B> {
    fn extract(&self, case_type: CaseType, text: &str) -> Result<Extraction, ExtractError> {
        let rules = self.rules.entities(case_type, text);
        if !uses_backend(case_type) {
            return Ok(Extraction::new(rules, ToolUsed::Rules));
        }

        match self.ask(case_type, text) {
            Ok(raw) => {
                let mut entities = normalize_entities(case_type, &raw);
                debug!(case_type = %case_type, keys = entities.len(), "external extraction succeeded");
                for (key, value) in rules {
                    entities.entry(key).or_insert(value);
                }
                Ok(Extraction::new(entities, ToolUsed::ExternalNlp))
            }
            Err(e) => {
                warn!(case_type = %case_type, error = %e, "external extraction failed, using rules");
                let mut extraction = Extraction::new(rules, ToolUsed::Rules);
                extraction.flags.insert(FLAG_EXTERNAL_NLP_FAILED.to_string());
                extraction.failure = Some(e.to_string());
                Ok(extraction)
            }
        }
    }

    fn clarifying_question(&self, case_type: CaseType, text: &str, missing: &[String]) -> Option<String> {
        let fallback = clarifying_question(missing)?;
        match self.backend.complete(&question_prompt(case_type, text, missing)) {
            Ok(reply) => Some(single_question(&reply).unwrap_or(fallback)),
            Err(e) => {
                warn!(case_type = %case_type, error = %e, "external clarifying question failed, using rules");
                Some(fallback)
            }
        }
    }

    fn narrate(&self, case_type: CaseType, text: &str, missing: &[String]) -> Narration {
        let fallback = Narration::from_rules(text, missing);
        let reply = match self.backend.complete(&narration_prompt(case_type, text, missing)) {
            Ok(reply) => clean_text(&strip_code_fences(&reply)),
            Err(e) => {
                warn!(case_type = %case_type, error = %e, "external summary failed, using rules");
                return fallback;
            }
        };

        let line_starting = |prefix: &str| {
            reply
                .lines()
                .map(str::trim)
                .find(|line| line.to_lowercase().starts_with(prefix))
                .map(str::to_string)
        };
        Narration {
            summary: line_starting("summary:").unwrap_or(fallback.summary),
            next_steps: line_starting("next steps:").unwrap_or(fallback.next_steps),
        }
    }
}

fn build_prompt(case_type: CaseType, text: &str) -> String {
    let keys: Vec<&str> = COMMON_KEYS
        .iter()
        .chain(case_keys(case_type))
        .copied()
        .collect();

    format!(
        "You are an enterprise intake assistant.\n\n\
         Case type: {case_type}\n\n\
         Extract relevant fields from the request.\n\
         Return ONLY a JSON object. Use null for unknown values.\n\n\
         Expected keys:\n{keys}\n\n\
         Request:\n{text}",
        keys = keys.join("\n"),
    )
}

fn missing_list(missing: &[String]) -> String {
    if missing.is_empty() {
        "none".to_string()
    } else {
        missing.join(", ")
    }
}

fn question_prompt(case_type: CaseType, text: &str, missing: &[String]) -> String {
    format!(
        "You write a single, polite clarifying question for an enterprise intake form.\n\n\
         Case type: {case_type}\n\
         Missing fields: {missing}\n\n\
         Rules:\n\
         - Output ONE sentence ending with a question mark.\n\
         - Mention all missing fields in natural language.\n\
         - Do NOT add extra questions or commentary, and do NOT invent values.\n\n\
         User request:\n{text}",
        missing = missing_list(missing),
    )
}

fn narration_prompt(case_type: CaseType, text: &str, missing: &[String]) -> String {
    format!(
        "Write two lines only.\n\n\
         Line 1 starts with 'Summary:' and is a single sentence describing the request in 20 words or fewer.\n\
         Line 2 starts with 'Next steps:' and is a single sentence. If there are missing fields, \
         ask for them; otherwise state it will be processed.\n\n\
         Case type: {case_type}\n\
         Missing fields: {missing}\n\n\
         User request:\n{text}",
        missing = missing_list(missing),
    )
}

/// First line of a model reply, kept only if it is a question
fn single_question(reply: &str) -> Option<String> {
    let cleaned = clean_text(&strip_code_fences(reply));
    let first = cleaned.lines().next()?.trim();
    first.ends_with('?').then(|| first.to_string())
}

/// First JSON object in a model reply, tolerating code fences and chatter
fn parse_json_object(reply: &str) -> Option<Map<String, Value>> {
    let raw = strip_code_fences(reply);
    if let Ok(Value::Object(map)) = serde_json::from_str(&raw) {
        return Some(map);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&raw[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn excerpt(reply: &str) -> String {
    reply.chars().take(80).collect()
}

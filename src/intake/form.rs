//! Structured intake form
//!
//! The form fields are folded into one labeled text block, so the rules that
//! read free text also read form submissions.

use serde::{Deserialize, Serialize};

/// A request as submitted through the intake form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeRequest {
    /// Existing case this request is about
    #[serde(default)]
    pub case_id: Option<String>,
    /// Case type chosen by the requester; `auto` leaves it to the classifier
    #[serde(default)]
    pub case_type_hint: Option<String>,
    #[serde(default)]
    pub location_or_program: Option<String>,
    #[serde(default)]
    pub requester_contact: Option<String>,
    pub details: String,
}

fn filled(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl IntakeRequest {
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
            ..Default::default()
        }
    }

    /// Compose the text block handed to the intake agent
    ///
    /// Blank fields are left out; the details always come last.
    pub fn compose(&self) -> String {
        let mut lines = Vec::new();

        if let Some(case_id) = filled(&self.case_id) {
            lines.push(case_id.to_string());
        }
        if let Some(hint) = filled(&self.case_type_hint).filter(|h| !h.eq_ignore_ascii_case("auto")) {
            lines.push(format!("Case type: {}", hint));
        }
        if let Some(location) = filled(&self.location_or_program) {
            lines.push(format!("Department/program: {}", location));
        }
        if let Some(contact) = filled(&self.requester_contact) {
            lines.push(format!("Contact: {}", contact));
        }
        let details = self.details.trim();
        if !details.is_empty() {
            lines.push(details.to_string());
        }

        lines.join("\n")
    }
}

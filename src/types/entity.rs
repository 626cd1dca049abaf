//! Entity values extracted from intake requests
//!
//! Entities are an open-keyed map, but values are restricted to a small
//! closed set of shapes so replayed state stays comparable field-for-field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value of a single extracted entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    List(Vec<String>),
}

/// Entity map keyed by field name; ordered so serialization is stable
pub type Entities = BTreeMap<String, EntityValue>;

impl EntityValue {
    /// True for empty text, an empty list, or the literal "unknown"
    pub fn is_blank(&self) -> bool {
        match self {
            EntityValue::Text(s) => {
                let s = s.trim();
                s.is_empty() || s.eq_ignore_ascii_case("unknown")
            }
            EntityValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            EntityValue::Text(s) => Some(s),
            EntityValue::List(_) => None,
        }
    }

    /// Render as a single display string (lists are comma separated)
    pub fn to_display(&self) -> String {
        match self {
            EntityValue::Text(s) => s.clone(),
            EntityValue::List(items) => items.join(", "),
        }
    }
}

impl From<&str> for EntityValue {
    fn from(s: &str) -> Self {
        EntityValue::Text(s.to_string())
    }
}

impl From<String> for EntityValue {
    fn from(s: String) -> Self {
        EntityValue::Text(s)
    }
}

impl From<Vec<String>> for EntityValue {
    fn from(items: Vec<String>) -> Self {
        EntityValue::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_shapes() {
        let text: EntityValue = serde_json::from_str("\"Finance\"").unwrap();
        assert_eq!(text, EntityValue::Text("Finance".to_string()));

        let list: EntityValue = serde_json::from_str("[\"a@x.org\",\"b@x.org\"]").unwrap();
        assert_eq!(list.to_display(), "a@x.org, b@x.org");

        // Numbers and objects are outside the closed set
        assert!(serde_json::from_str::<EntityValue>("3").is_err());
        assert!(serde_json::from_str::<EntityValue>("{\"a\":1}").is_err());
    }

    #[test]
    fn test_blank_values() {
        assert!(EntityValue::from("  ").is_blank());
        assert!(EntityValue::from("Unknown").is_blank());
        assert!(EntityValue::List(vec![]).is_blank());
        assert!(!EntityValue::from("IT").is_blank());
    }
}

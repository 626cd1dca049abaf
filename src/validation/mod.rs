//! Schema validation for case events
//!
//! This module guards the log: malformed events are rejected before any write.

mod schema;

pub use schema::{
    event_from_value, validate_case_type, validate_event, validate_sla_due, SchemaError, MAX_ENTITY_KEY_LEN,
    STANDARD_CASE_TYPES,
};

//! Event Store Module for Event Sourcing
//!
//! This module provides the case persistence layer:
//! - `EventLog`: Append-only JSONL storage with a single writer lock
//! - `replay`: Pure fold from ordered events to `CaseState`
//! - `CaseStore`: Facade that validates, appends and replays
//! - `LogStats`: Counts and sizes for inspection
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌─────────┐    ┌────────────────┐    ┌────────────────────┐    ┌─────────────┐
//! │ Intake  │───►│ validate_event │───►│ writer lock +      │───►│ append line │
//! │ / API   │    │ (SchemaError)  │    │ one-create check   │    │ + fsync     │
//! └─────────┘    └────────────────┘    └────────────────────┘    └─────────────┘
//!
//! Read Path (every get_state):
//! ┌──────────────────┐    ┌──────────────────┐    ┌─────────────┐
//! │ scan cases.jsonl │───►│ filter by case id│───►│ replay fold │───► CaseState
//! │ (skip corrupt)   │    └──────────────────┘    └─────────────┘
//! └──────────────────┘
//! ```

mod log;
mod replay;
mod stats;
mod store;

pub use log::{CorruptRecord, EventLog, LogEntry, LogScan};
pub use replay::{apply_event, replay};
pub use stats::LogStats;
pub use store::{
    CaseReplay, CaseStore, StoreConfig, StoreError, StoreResult, LOG_FILE_NAME,
};

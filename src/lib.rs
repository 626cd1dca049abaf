//! Case Ledger
//!
//! An event-sourced store for intake cases, backed by an append-only JSONL
//! log. Case state is never stored; it is rebuilt by replaying the case's
//! events in log order.
//!
//! # Features
//!
//! - **Append-only**: One JSON event per line, fsynced before append returns
//! - **Deterministic replay**: Same events in, byte-identical state out
//! - **Corruption tolerant**: Unreadable lines are skipped and reported
//! - **Intake pipeline**: Classify, extract, and record free-text requests
//! - **HTTP API**: JSON endpoints over the store and the pipeline
//!
//! # Modules
//!
//! - `types`: Core data structures (CaseId, Event, CaseState)
//! - `validation`: Event schema checks
//! - `event_store`: Log, replay engine, and the `CaseStore` facade
//! - `intake`: Planner, extractors, and the intake agent
//! - `api`: Axum router and handlers
//! - `config`: Environment configuration
//! - `utils`: Utility functions (timestamps, etc.)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use case_ledger::{CaseStore, IntakeAgent, StoreConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(CaseStore::open(&StoreConfig::new("data"))?);
//!     let agent = IntakeAgent::with_rules(Arc::clone(&store));
//!
//!     let outcome = agent.run("Please grant access to the finance shared drive")?;
//!     println!("{} -> {:?}", outcome.case_id, outcome.state.missing_info);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod event_store;
pub mod intake;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used items
pub use config::{Config, ConfigError, NlpConfig};
pub use event_store::{CaseReplay, CaseStore, CorruptRecord, EventLog, LogStats, StoreConfig, StoreError, StoreResult};
pub use intake::{IntakeAgent, IntakeError, IntakeOutcome, IntakeRequest};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

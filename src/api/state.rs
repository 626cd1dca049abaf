//! Shared application state for the HTTP handlers

use std::sync::Arc;

use crate::event_store::CaseStore;
use crate::intake::IntakeAgent;

/// State shared by every request
///
/// Both members are synchronous; handlers reach them through
/// `tokio::task::spawn_blocking`.
pub struct AppState {
    pub store: Arc<CaseStore>,
    pub agent: Arc<IntakeAgent>,
}

impl AppState {
    pub fn new(store: Arc<CaseStore>, agent: IntakeAgent) -> Self {
        Self {
            store,
            agent: Arc::new(agent),
        }
    }

    /// State whose agent uses the rule-based extractor over `store`
    pub fn with_rules(store: Arc<CaseStore>) -> Self {
        let agent = IntakeAgent::with_rules(Arc::clone(&store));
        Self::new(store, agent)
    }
}

//! Case Store - the facade other layers talk to
//!
//! The CaseStore owns the event log, validates events before they are
//! written, enforces the one-creation-per-case invariant under the writer
//! lock, and rebuilds case state by replay on every read.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{CaseId, CaseState, Event, EventPayload, EventType, InvalidCaseId};
use crate::validation::{validate_case_type, validate_event, validate_sla_due, SchemaError};

use super::log::{warn_corrupt, CorruptRecord, EventLog, LogEntry};
use super::replay::replay;
use super::stats::LogStats;

/// File name of the case log inside the data directory
pub const LOG_FILE_NAME: &str = "cases.jsonl";

/// Configuration for the CaseStore
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
    /// Attempts made for a single append before giving up
    pub write_retries: u32,
    /// Base delay between append attempts (multiplied by the attempt number)
    pub retry_backoff: Duration,
    /// Corrupt records tolerated during a replay before it is refused
    pub max_corrupt_records: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            write_retries: 3,
            retry_backoff: Duration::from_millis(10),
            max_corrupt_records: 8,
        }
    }
}

impl StoreConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_write_retries(mut self, write_retries: u32) -> Self {
        self.write_retries = write_retries;
        self
    }

    pub fn with_max_corrupt_records(mut self, max_corrupt_records: usize) -> Self {
        self.max_corrupt_records = max_corrupt_records;
        self
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to cases.jsonl
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }
}

/// Result type for CaseStore operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in CaseStore operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed event, rejected before any write
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    InvalidCaseId(#[from] InvalidCaseId),

    /// Append did not become durable
    #[error("write failed after {attempts} attempt(s): {source}")]
    WriteFailure { attempts: u32, source: io::Error },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// First event of the case is not `case_created`
    #[error("case {0} starts with a follow_up and has no case_created event")]
    OrphanFollowUp(CaseId),

    #[error("case {case_id} has a second case_created event at position {position}")]
    DuplicateCaseCreated { case_id: CaseId, position: usize },

    #[error("case {0} not found")]
    CaseNotFound(CaseId),

    #[error("case {0} already exists")]
    CaseAlreadyExists(CaseId),

    #[error("replay saw {count} corrupt record(s), limit is {limit}")]
    TooManyCorruptRecords { count: usize, limit: usize },
}

impl StoreError {
    /// Data-integrity problems in the stored history
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            StoreError::OrphanFollowUp(_)
                | StoreError::DuplicateCaseCreated { .. }
                | StoreError::TooManyCorruptRecords { .. }
        )
    }

    /// The normal "no such case" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::CaseNotFound(_))
    }
}

/// Replayed state together with the corruption seen while reading the log
#[derive(Debug, Clone, Serialize)]
pub struct CaseReplay {
    pub state: CaseState,
    /// Unreadable records that name this case or fall inside its history
    pub corrupt_records: Vec<CorruptRecord>,
}

/// Event-sourced case store
pub struct CaseStore {
    log: EventLog,
    max_corrupt_records: usize,
}

impl CaseStore {
    /// Open the store described by `config`
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let log = EventLog::open(config)?;
        info!(path = %log.path().display(), "opened case log");
        Ok(Self::with_log(log, config.max_corrupt_records))
    }

    /// Wrap an existing log
    pub fn with_log(log: EventLog, max_corrupt_records: usize) -> Self {
        Self {
            log,
            max_corrupt_records,
        }
    }

    /// The underlying log
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// True iff a `case_created` event for `case_id` has been appended
    pub fn exists(&self, case_id: &CaseId) -> StoreResult<bool> {
        case_created_in(&self.log, case_id)
    }

    /// Validate and durably append an event
    ///
    /// A `case_created` for an existing id fails with `CaseAlreadyExists`;
    /// a `follow_up` for an unknown id fails with `CaseNotFound`. Both are
    /// decided under the writer lock.
    pub fn append(&self, event: &Event) -> StoreResult<()> {
        validate_event(event)?;
        if let EventPayload::CaseCreated(data) = &event.payload {
            if let Some(warning) = validate_case_type(&data.case_type) {
                warn!(case_id = %event.case_id, "{}", warning);
            }
        }
        if let Some(warning) = validate_sla_due(event) {
            warn!(case_id = %event.case_id, "{}", warning);
        }

        self.log.append_with(event, |log| {
            let exists = case_created_in(log, &event.case_id)?;
            match event.event_type() {
                EventType::CaseCreated if exists => {
                    Err(StoreError::CaseAlreadyExists(event.case_id.clone()))
                }
                EventType::FollowUp if !exists => {
                    Err(StoreError::CaseNotFound(event.case_id.clone()))
                }
                _ => Ok(()),
            }
        })?;

        info!(
            case_id = %event.case_id,
            event_type = %event.event_type(),
            tool_used = %event.audit.tool_used,
            "appended event"
        );
        Ok(())
    }

    /// Current state of a case
    pub fn get_state(&self, case_id: &CaseId) -> StoreResult<CaseState> {
        self.replay_case(case_id).map(|replay| replay.state)
    }

    /// Replay a case, reporting the corrupt records that may belong to it
    ///
    /// A corrupt record counts against this case when its raw bytes still
    /// name the case, or when it names no case and sits between the case's
    /// first and last readable event. Records naming another case are ignored.
    pub fn replay_case(&self, case_id: &CaseId) -> StoreResult<CaseReplay> {
        let mut events = Vec::new();
        let mut span: Option<(usize, usize)> = None;
        let mut corrupt_records = Vec::new();
        let mut unattributed = Vec::new();

        for entry in self.log.scan()? {
            match entry {
                LogEntry::Event { line, event } if &event.case_id == case_id => {
                    let first = span.map_or(line, |(first, _)| first);
                    span = Some((first, line));
                    events.push(event);
                }
                LogEntry::Event { .. } => {}
                LogEntry::Corrupt(record) if record.belongs_to(case_id) => {
                    corrupt_records.push(record)
                }
                LogEntry::Corrupt(record) if record.case_id.is_none() => unattributed.push(record),
                LogEntry::Corrupt(_) => {}
            }
        }

        if let Some((first, last)) = span {
            corrupt_records.extend(
                unattributed
                    .into_iter()
                    .filter(|record| record.line > first && record.line < last),
            );
            corrupt_records.sort_by_key(|record| record.line);
        }
        for record in &corrupt_records {
            warn_corrupt(record);
        }

        if corrupt_records.len() > self.max_corrupt_records {
            return Err(StoreError::TooManyCorruptRecords {
                count: corrupt_records.len(),
                limit: self.max_corrupt_records,
            });
        }

        let state = replay(case_id, events)?;
        Ok(CaseReplay {
            state,
            corrupt_records,
        })
    }

    /// Every readable event, in append order (inspection only)
    pub fn read_all(&self) -> StoreResult<impl Iterator<Item = Event>> {
        self.log.read_all()
    }

    /// Events of one case, in append order (inspection only)
    pub fn read_for_case(&self, case_id: &CaseId) -> StoreResult<impl Iterator<Item = Event>> {
        self.log.read_for_case(case_id)
    }

    /// Ids of all created cases, in creation order
    pub fn list_cases(&self) -> StoreResult<Vec<CaseId>> {
        let mut seen = HashSet::new();
        Ok(self
            .read_all()?
            .filter(|event| event.is_case_created())
            .map(|event| event.case_id)
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }

    /// Counts and sizes of the underlying log
    pub fn stats(&self) -> StoreResult<LogStats> {
        self.log.stats()
    }

    /// First unused case id at or after `now`, stepping one second at a time
    ///
    /// The id is only reserved once its `case_created` event is appended;
    /// callers must still handle `CaseAlreadyExists` from `append`.
    pub fn next_case_id<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> StoreResult<CaseId>
    where
        Tz::Offset: std::fmt::Display,
    {
        let taken: HashSet<CaseId> = self.list_cases()?.into_iter().collect();
        let mut at = now.clone();
        loop {
            let candidate = CaseId::from_datetime(&at);
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            at = at + ChronoDuration::seconds(1);
        }
    }
}

fn case_created_in(log: &EventLog, case_id: &CaseId) -> StoreResult<bool> {
    Ok(log.scan()?.any(|entry| {
        matches!(entry, LogEntry::Event { ref event, .. }
            if &event.case_id == case_id && event.is_case_created())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Audit, CaseCreatedData, Entities, EntityValue, FollowUpData, Priority, ToolUsed,
    };
    use chrono::{DateTime, FixedOffset};
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    const ID: &str = "CASE-20250114-093012";

    fn create_test_store() -> (CaseStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path());
        let store = CaseStore::open(&config).unwrap();
        (store, temp_dir)
    }

    fn ts(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn created(id: &str) -> Event {
        let mut entities = Entities::new();
        entities.insert("name".to_string(), EntityValue::from("A"));
        entities.insert("dept".to_string(), EntityValue::from("X"));
        Event::case_created(
            CaseId::parse(id).unwrap(),
            ts("2025-01-14T09:30:12+00:00"),
            CaseCreatedData {
                case_type: "access_request".to_string(),
                entities,
                missing_info: vec!["approver".to_string()],
                routing: "ServiceDesk-Access".to_string(),
                priority: Priority::Normal,
                sla_due: ts("2025-01-24T09:30:12+00:00"),
                draft_response: "Thanks".to_string(),
                request_text: None,
                summary: None,
                next_steps: None,
                clarifying_question: None,
            },
            Audit::new(ToolUsed::Rules),
        )
    }

    fn follow_up(id: &str, key: &str, value: &str) -> Event {
        let mut update = Entities::new();
        update.insert(key.to_string(), EntityValue::from(value));
        Event::follow_up(
            CaseId::parse(id).unwrap(),
            ts("2025-01-15T09:30:12+00:00"),
            FollowUpData {
                entities_update: update,
                missing_info_after: vec![],
                message: None,
                summary: None,
                next_steps: None,
                clarifying_question: None,
            },
            Audit::new(ToolUsed::Rules),
        )
    }

    fn id() -> CaseId {
        CaseId::parse(ID).unwrap()
    }

    #[test]
    fn test_exists_tracks_case_created() {
        let (store, _temp_dir) = create_test_store();
        assert!(!store.exists(&id()).unwrap());

        store.append(&created(ID)).unwrap();
        assert!(store.exists(&id()).unwrap());
    }

    #[test]
    fn test_get_state_merges_follow_up() {
        let (store, _temp_dir) = create_test_store();
        store.append(&created(ID)).unwrap();
        store.append(&follow_up(ID, "dept", "Y")).unwrap();

        let state = store.get_state(&id()).unwrap();
        assert_eq!(state.entities["name"], EntityValue::from("A"));
        assert_eq!(state.entities["dept"], EntityValue::from("Y"));
        assert!(state.is_complete());
        assert_eq!(state.event_count, 2);
    }

    #[test]
    fn test_not_found_on_empty_store() {
        let (store, _temp_dir) = create_test_store();
        let missing = CaseId::parse("CASE-20200101-000000").unwrap();

        let err = store.get_state(&missing).unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_integrity());
    }

    #[test]
    fn test_duplicate_case_created_rejected() {
        let (store, _temp_dir) = create_test_store();
        store.append(&created(ID)).unwrap();

        let err = store.append(&created(ID)).unwrap_err();
        assert!(matches!(err, StoreError::CaseAlreadyExists(_)));
        assert_eq!(store.read_all().unwrap().count(), 1);
    }

    #[test]
    fn test_follow_up_for_unknown_case_rejected() {
        let (store, _temp_dir) = create_test_store();
        let err = store.append(&follow_up(ID, "dept", "Y")).unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.log().path().exists());
    }

    #[test]
    fn test_schema_error_never_writes() {
        let (store, _temp_dir) = create_test_store();
        let mut event = created(ID);
        if let EventPayload::CaseCreated(data) = &mut event.payload {
            data.routing = String::new();
        }

        assert!(matches!(store.append(&event), Err(StoreError::Schema(_))));
        assert!(!store.log().path().exists());
    }

    #[test]
    fn test_orphan_in_log_is_integrity_error() {
        let (store, _temp_dir) = create_test_store();
        // Bypass the facade to simulate a truncated history
        store.log().append(&follow_up(ID, "dept", "Y")).unwrap();

        let err = store.get_state(&id()).unwrap_err();
        assert!(matches!(err, StoreError::OrphanFollowUp(_)));
        assert!(err.is_integrity());
    }

    #[test]
    fn test_corrupt_records_are_flagged() {
        let (store, _temp_dir) = create_test_store();
        store.append(&created(ID)).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.log().path())
            .unwrap();
        writeln!(file, "garbage").unwrap();
        drop(file);

        store.append(&follow_up(ID, "dept", "Y")).unwrap();

        let replay = store.replay_case(&id()).unwrap();
        assert_eq!(replay.state.event_count, 2);
        assert_eq!(replay.corrupt_records.len(), 1);
        assert_eq!(replay.corrupt_records[0].line, 2);
    }

    #[test]
    fn test_too_many_corrupt_records() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path()).with_max_corrupt_records(1);
        let store = CaseStore::open(&config).unwrap();
        store.append(&created(ID)).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.log().path())
            .unwrap();
        writeln!(file, "bad one").unwrap();
        writeln!(file, "bad two").unwrap();
        drop(file);
        store.append(&follow_up(ID, "dept", "Y")).unwrap();

        let err = store.get_state(&id()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::TooManyCorruptRecords { count: 2, limit: 1 }
        ));
        assert!(err.is_integrity());
    }

    #[test]
    fn test_corrupt_records_of_other_cases_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path()).with_max_corrupt_records(2);
        let store = CaseStore::open(&config).unwrap();
        store.append(&created(ID)).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.log().path())
            .unwrap();
        for _ in 0..5 {
            writeln!(file, "{{\"case_id\":\"CASE-20990101-000000\",\"event_type\":").unwrap();
        }
        drop(file);

        let later = "CASE-20250114-093013";
        store.append(&created(later)).unwrap();

        let replay = store.replay_case(&id()).unwrap();
        assert!(replay.corrupt_records.is_empty());
        let replay = store.replay_case(&CaseId::parse(later).unwrap()).unwrap();
        assert!(replay.corrupt_records.is_empty());

        let owner = CaseId::parse("CASE-20990101-000000").unwrap();
        assert!(matches!(
            store.get_state(&owner),
            Err(StoreError::TooManyCorruptRecords { count: 5, limit: 2 })
        ));
    }

    #[test]
    fn test_unattributed_corrupt_record_outside_case_history_is_ignored() {
        let (store, _temp_dir) = create_test_store();
        store.append(&created(ID)).unwrap();
        store.append(&follow_up(ID, "dept", "Y")).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.log().path())
            .unwrap();
        writeln!(file, "garbage").unwrap();
        drop(file);
        store.append(&created("CASE-20250114-093013")).unwrap();

        assert!(store.replay_case(&id()).unwrap().corrupt_records.is_empty());
        assert!(store
            .replay_case(&CaseId::parse("CASE-20250114-093013").unwrap())
            .unwrap()
            .corrupt_records
            .is_empty());
    }

    #[test]
    fn test_overdue_case_can_be_backfilled() {
        let (store, _temp_dir) = create_test_store();
        let mut event = created(ID);
        if let EventPayload::CaseCreated(data) = &mut event.payload {
            data.sla_due = ts("2025-01-01T00:00:00+00:00");
        }

        store.append(&event).unwrap();
        let state = store.get_state(&id()).unwrap();
        assert!(state.sla_due < state.created_at);
    }

    #[test]
    fn test_list_cases_and_next_case_id() {
        let (store, _temp_dir) = create_test_store();
        store.append(&created(ID)).unwrap();
        store.append(&created("CASE-20250114-093013")).unwrap();
        store.append(&follow_up(ID, "dept", "Y")).unwrap();

        let cases = store.list_cases().unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0], id());

        let now = ts("2025-01-14T09:30:12+00:00");
        let next = store.next_case_id(&now).unwrap();
        assert_eq!(next.as_str(), "CASE-20250114-093014");
    }
}

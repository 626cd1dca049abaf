//! Event Log - append-only JSONL storage
//!
//! One event per line, written whole under an exclusive writer lock and
//! synced before the append returns. Reads are lazy scans that start from
//! the beginning of the file on every call and never take the writer lock.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Take, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{CaseId, Event};

use super::store::{StoreConfig, StoreError, StoreResult};

const EXCERPT_LEN: usize = 80;

/// A log line that could not be decoded into an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptRecord {
    /// 1-based line number in the log
    pub line: usize,
    pub reason: String,
    /// Leading characters of the raw line
    pub excerpt: String,
    /// Case the raw bytes still name, when one can be read out of them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
}

impl CorruptRecord {
    /// True when the record names `case_id`
    pub fn belongs_to(&self, case_id: &CaseId) -> bool {
        self.case_id.as_ref() == Some(case_id)
    }
}

/// One item produced by a log scan
#[derive(Debug, Clone)]
pub enum LogEntry {
    Event { line: usize, event: Event },
    Corrupt(CorruptRecord),
}

/// Durable, strictly-ordered, append-only event storage
pub struct EventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
    write_retries: u32,
    retry_backoff: Duration,
}

impl EventLog {
    /// Open the log described by `config`, creating its directory if needed
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let path = config.log_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            write_retries: config.write_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// Path to the JSONL file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event to the log
    pub fn append(&self, event: &Event) -> StoreResult<()> {
        self.append_with(event, |_| Ok(()))
    }

    /// Append an event after `check` passes, both under the writer lock
    ///
    /// `check` sees the log exactly as the write will extend it, so
    /// invariants that depend on earlier records cannot race another writer.
    pub fn append_with<F>(&self, event: &Event, check: F) -> StoreResult<()>
    where
        F: FnOnce(&EventLog) -> StoreResult<()>,
    {
        let mut line = event.to_json_line().map_err(|e| StoreError::WriteFailure {
            attempts: 0,
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        check(self)?;

        let attempts = self.write_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.write_record(line.as_bytes()) {
                Ok(()) => {
                    debug!(
                        case_id = %event.case_id,
                        event_type = %event.event_type(),
                        attempt,
                        "record written"
                    );
                    return Ok(());
                }
                Err(source) if attempt >= attempts => {
                    return Err(StoreError::WriteFailure {
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        case_id = %event.case_id,
                        attempt,
                        error = %e,
                        "append failed, retrying"
                    );
                    thread::sleep(self.retry_backoff * attempt);
                }
            }
        }
    }

    /// Write one whole record and sync it to disk
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let len_before = file.metadata()?.len();
        let result = if ends_mid_line(&mut file, len_before)? {
            // Terminate a truncated tail so it stays one corrupt line
            let mut buf = Vec::with_capacity(record.len() + 1);
            buf.push(b'\n');
            buf.extend_from_slice(record);
            file.write_all(&buf)
        } else {
            file.write_all(record)
        }
        .and_then(|_| file.sync_all());

        if result.is_err() {
            // Drop any partial bytes so a retry starts on a clean record boundary
            if let Err(e) = file.set_len(len_before) {
                warn!(error = %e, "could not roll back partial record");
            }
        }
        result
    }

    /// Scan the log from the beginning, yielding events and corrupt records
    ///
    /// The scan is bounded by the file length at call time. A final line
    /// without its newline is reported as corrupt and never decoded.
    pub fn scan(&self) -> StoreResult<LogScan> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogScan::empty()),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();

        Ok(LogScan {
            reader: Some(BufReader::new(file.take(len))),
            line: 0,
            buf: Vec::new(),
        })
    }

    /// All events in append order; corrupt records are skipped with a warning
    pub fn read_all(&self) -> StoreResult<impl Iterator<Item = Event>> {
        Ok(self.scan()?.filter_map(|entry| match entry {
            LogEntry::Event { event, .. } => Some(event),
            LogEntry::Corrupt(record) => {
                warn_corrupt(&record);
                None
            }
        }))
    }

    /// Events for one case, preserving their relative order
    pub fn read_for_case(&self, case_id: &CaseId) -> StoreResult<impl Iterator<Item = Event>> {
        let case_id = case_id.clone();
        Ok(self.read_all()?.filter(move |event| event.case_id == case_id))
    }
}

pub(crate) fn warn_corrupt(record: &CorruptRecord) {
    warn!(
        line = record.line,
        reason = %record.reason,
        excerpt = %record.excerpt,
        "skipping corrupt log record"
    );
}

/// Lazy iterator over the records of an `EventLog`
pub struct LogScan {
    reader: Option<BufReader<Take<File>>>,
    line: usize,
    buf: Vec<u8>,
}

impl LogScan {
    fn empty() -> Self {
        Self {
            reader: None,
            line: 0,
            buf: Vec::new(),
        }
    }
}

impl Iterator for LogScan {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        loop {
            let reader = self.reader.as_mut()?;
            self.buf.clear();

            let read = reader.read_until(b'\n', &mut self.buf);
            match read {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.reader = None;
                    self.line += 1;
                    return Some(LogEntry::Corrupt(corrupt(
                        self.line,
                        format!("read failed: {}", e),
                        &self.buf,
                    )));
                }
            }

            self.line += 1;
            let line = self.line;

            if self.buf.last() != Some(&b'\n') {
                // Half-written or crash-truncated tail
                self.reader = None;
                return Some(LogEntry::Corrupt(corrupt(
                    line,
                    "truncated record".to_string(),
                    &self.buf,
                )));
            }

            let text = match std::str::from_utf8(&self.buf) {
                Ok(text) => text.trim(),
                Err(e) => {
                    return Some(LogEntry::Corrupt(corrupt(
                        line,
                        format!("invalid UTF-8: {}", e),
                        &self.buf,
                    )))
                }
            };

            if text.is_empty() {
                continue;
            }

            return Some(match Event::from_json_line(text) {
                Ok(event) => LogEntry::Event { line, event },
                Err(e) => LogEntry::Corrupt(corrupt(line, e.to_string(), &self.buf)),
            });
        }
    }
}

fn corrupt(line: usize, reason: String, raw: &[u8]) -> CorruptRecord {
    let text = String::from_utf8_lossy(raw);
    let excerpt: String = text.trim_end().chars().take(EXCERPT_LEN).collect();
    CorruptRecord {
        line,
        reason,
        excerpt,
        case_id: salvage_case_id(&text),
    }
}

/// Case id of a damaged record, read leniently from its raw text
fn salvage_case_id(text: &str) -> Option<CaseId> {
    static CASE_ID_FIELD: OnceLock<Regex> = OnceLock::new();
    let re = CASE_ID_FIELD.get_or_init(|| {
        Regex::new(r#""case_id"\s*:\s*"(CASE-\d{8}-\d{6})""#).expect("literal pattern compiles")
    });
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| CaseId::parse(m.as_str()).ok())
}

fn ends_mid_line(file: &mut File, len: u64) -> io::Result<bool> {
    if len == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

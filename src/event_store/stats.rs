//! Case log statistics
//!
//! Provides statistics about the case log including:
//! - Record counts by event type
//! - Corrupt record count
//! - Storage size information

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;

use serde::Serialize;

use crate::types::EventType;

use super::log::{EventLog, LogEntry};
use super::store::StoreResult;

/// Statistics about the case log
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogStats {
    /// Readable events in the log
    pub record_count: usize,
    /// Lines that could not be decoded
    pub corrupt_count: usize,
    /// Events by type
    pub events_by_type: BTreeMap<EventType, usize>,
    /// Distinct case ids with a `case_created` event
    pub case_count: usize,
    /// Size of the log file in bytes
    pub log_size_bytes: u64,
    /// `log_size_bytes` in human-readable form
    pub log_size: String,
}

impl LogStats {
    /// Format size in human-readable format
    pub fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}

impl EventLog {
    /// Collect statistics with a single scan
    pub fn stats(&self) -> StoreResult<LogStats> {
        let mut stats = LogStats::default();
        let mut cases = HashSet::new();

        for entry in self.scan()? {
            match entry {
                LogEntry::Event { event, .. } => {
                    stats.record_count += 1;
                    *stats.events_by_type.entry(event.event_type()).or_insert(0) += 1;
                    if event.is_case_created() {
                        cases.insert(event.case_id);
                    }
                }
                LogEntry::Corrupt(_) => stats.corrupt_count += 1,
            }
        }

        stats.case_count = cases.len();
        stats.log_size_bytes = match fs::metadata(self.path()) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        stats.log_size = LogStats::format_size(stats.log_size_bytes);

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::StoreConfig;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(LogStats::format_size(512), "512 B");
        assert_eq!(LogStats::format_size(2048), "2.00 KB");
        assert_eq!(LogStats::format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_stats_on_missing_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(&StoreConfig::new(temp_dir.path())).unwrap();

        let stats = log.stats().unwrap();
        assert_eq!(stats.record_count, 0);
        assert_eq!(stats.log_size_bytes, 0);
        assert_eq!(stats.log_size, "0 B");
    }

    #[test]
    fn test_stats_counts_corrupt_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(&StoreConfig::new(temp_dir.path())).unwrap();
        fs::write(log.path(), "not json\n").unwrap();

        let stats = log.stats().unwrap();
        assert_eq!(stats.record_count, 0);
        assert_eq!(stats.corrupt_count, 1);
        assert_eq!(stats.log_size_bytes, 9);
    }
}

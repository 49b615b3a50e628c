//! Bounded operation history for the UI's log view
//!
//! Pipeline and retention failures never cross thread boundaries as
//! panics; they land here as success/failure records with a reason string,
//! which the UI renders and the engine otherwise ignores.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default number of retained operation records
pub const DEFAULT_OPLOG_CAPACITY: usize = 256;

/// One reported operation, successful or not
#[derive(Debug, Clone)]
pub struct OperationRecord {
    /// When the operation finished
    pub at: DateTime<Local>,
    /// File the operation concerned
    pub path: PathBuf,
    /// Whether it succeeded
    pub success: bool,
    /// Human-readable outcome or failure reason
    pub detail: String,
}

/// Most-recent-first, capacity-bounded operation log
#[derive(Debug)]
pub struct OperationLog {
    records: Mutex<VecDeque<OperationRecord>>,
    capacity: usize,
}

impl OperationLog {
    /// Create a log with the default capacity
    pub fn new() -> OperationLog {
        OperationLog::with_capacity(DEFAULT_OPLOG_CAPACITY)
    }

    /// Create a log retaining at most `capacity` records
    pub fn with_capacity(capacity: usize) -> OperationLog {
        OperationLog {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    /// Record a successful operation
    pub fn success(&self, path: &Path, detail: impl Into<String>) {
        self.push(path, true, detail.into());
    }

    /// Record a failed or refused operation
    pub fn failure(&self, path: &Path, detail: impl Into<String>) {
        let detail = detail.into();
        warn!("operation failed for {:?}: {}", path, detail);
        self.push(path, false, detail);
    }

    fn push(&self, path: &Path, success: bool, detail: String) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_back();
        }
        records.push_front(OperationRecord {
            at: Local::now(),
            path: path.to_path_buf(),
            success,
            detail,
        });
    }

    /// Snapshot of the retained records, most recent first
    pub fn recent(&self) -> Vec<OperationRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the log holds no records
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for OperationLog {
    fn default() -> Self {
        OperationLog::new()
    }
}

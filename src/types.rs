//! Common types and data structures for the backup engine

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one watched folder
///
/// Owned by the settings object; consumed by exactly one folder watcher at
/// a time. Changing it requires restarting the watcher set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchedFolder {
    /// Absolute directory to watch
    pub path: PathBuf,
    /// Whether changes in subdirectories qualify
    pub include_subfolders: bool,
    /// Raw include token list (comma/semicolon/whitespace delimited)
    pub include_filters: String,
    /// Raw exclude token list
    pub exclude_filters: String,
}

impl Default for WatchedFolder {
    fn default() -> Self {
        WatchedFolder {
            path: PathBuf::new(),
            include_subfolders: true,
            include_filters: String::new(),
            exclude_filters: String::new(),
        }
    }
}

impl WatchedFolder {
    /// Convenience constructor for a recursive watch without filters
    pub fn new(path: impl Into<PathBuf>) -> WatchedFolder {
        WatchedFolder {
            path: path.into(),
            ..WatchedFolder::default()
        }
    }
}

/// All known versions of one original file, ascending by timestamp
///
/// Created on the first successful backup or first scan match; destroyed
/// when its version list becomes empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Absolute path of the original file
    pub original_path: PathBuf,
    /// Version timestamps, sorted ascending, one-second resolution
    pub versions: Vec<NaiveDateTime>,
}

impl VersionRecord {
    /// Create an empty record for a path
    pub fn new(original_path: impl Into<PathBuf>) -> VersionRecord {
        VersionRecord {
            original_path: original_path.into(),
            versions: Vec::new(),
        }
    }

    /// Insert a timestamp, keeping the list sorted and duplicate-free
    ///
    /// Two backups within the same second map to the same file name, so a
    /// duplicate timestamp is a single version.
    pub fn insert(&mut self, timestamp: NaiveDateTime) {
        if let Err(pos) = self.versions.binary_search(&timestamp) {
            self.versions.insert(pos, timestamp);
        }
    }

    /// Remove a timestamp; returns whether it was present
    pub fn remove(&mut self, timestamp: NaiveDateTime) -> bool {
        match self.versions.binary_search(&timestamp) {
            Ok(pos) => {
                self.versions.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Oldest version timestamp, if any
    pub fn oldest(&self) -> Option<NaiveDateTime> {
        self.versions.first().copied()
    }

    /// Newest version timestamp, if any
    pub fn newest(&self) -> Option<NaiveDateTime> {
        self.versions.last().copied()
    }

    /// Number of versions held
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the record holds no versions
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// One entry in the current day's history, most-recent-first in the view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayHistoryEntry {
    /// Original file the version was taken from
    pub original_path: PathBuf,
    /// Version timestamp
    pub timestamp: NaiveDateTime,
    /// Derived backup file location
    pub backup_path: PathBuf,
}

/// Change-event action kinds that qualify for the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// File was created
    Created,
    /// File contents were modified
    Modified,
    /// File was renamed to this path
    RenamedTo,
}

/// One OS-level change notification, as seen by a folder watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Full path of the changed file
    pub path: PathBuf,
    /// What happened to it
    pub action: ChangeAction,
}

impl ChangeEvent {
    /// Construct an event for a path and action
    pub fn new(path: impl Into<PathBuf>, action: ChangeAction) -> ChangeEvent {
        ChangeEvent {
            path: path.into(),
            action,
        }
    }
}

/// Result of running one candidate file through the backup pipeline
///
/// Failures never propagate as panics across watcher threads; they are
/// reduced to this outcome plus an operation-log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// A new version was materialized at the given backup path
    BackedUp(PathBuf),
    /// The candidate was skipped before any filesystem mutation
    Skipped(SkipReason),
    /// The copy failed; the index was not mutated
    Failed(String),
}

/// Why a candidate was skipped without touching the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The pause controller reports paused; the event is dropped, not queued
    Paused,
    /// No backup root is configured
    NoBackupRoot,
    /// The path vanished or is not a regular file
    NotARegularFile,
}

impl SkipReason {
    /// Human-readable reason string for the operation log
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Paused => "backups are paused",
            SkipReason::NoBackupRoot => "backup root is not configured",
            SkipReason::NotARegularFile => "path is not a regular file",
        }
    }
}

/// Whether `path` lies underneath `root` (or is `root` itself)
pub fn is_path_under(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

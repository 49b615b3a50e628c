//! In-memory version index: the authoritative map of existing backups
//!
//! Maps each original path to its sorted set of version timestamps. The
//! index is rebuildable at any time from the backup root by re-deriving
//! every record from file names alone, which makes it self-healing against
//! process crashes and manual file deletion. Callers synchronize access
//! through a single reader-writer lock owned by the engine; the index type
//! itself is plain data.

use crate::codec;
use crate::error::Result;
use crate::filter::contains_all_keywords;
use crate::types::VersionRecord;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

/// Map from original path to its version record
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VersionIndex {
    records: BTreeMap<PathBuf, VersionRecord>,
}

impl VersionIndex {
    /// Create an empty index
    pub fn new() -> VersionIndex {
        VersionIndex::default()
    }

    /// Number of original files with at least one version
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no files are indexed
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of versions across all records
    pub fn version_count(&self) -> usize {
        self.records.values().map(VersionRecord::len).sum()
    }

    /// Look up the record for an original path
    pub fn record(&self, original: &Path) -> Option<&VersionRecord> {
        self.records.get(original)
    }

    /// Insert one version, creating the record on first use
    ///
    /// Returns the number of versions the record holds afterwards.
    pub fn insert_version(&mut self, original: &Path, timestamp: NaiveDateTime) -> usize {
        let record = self
            .records
            .entry(original.to_path_buf())
            .or_insert_with(|| VersionRecord::new(original));
        record.insert(timestamp);
        record.len()
    }

    /// Remove one version; the record is destroyed when it becomes empty
    ///
    /// Returns whether the version was present.
    pub fn remove_version(&mut self, original: &Path, timestamp: NaiveDateTime) -> bool {
        let Some(record) = self.records.get_mut(original) else {
            return false;
        };

        let removed = record.remove(timestamp);
        if record.is_empty() {
            self.records.remove(original);
        }
        removed
    }

    /// Remove a whole record; returns it if it existed
    pub fn remove_record(&mut self, original: &Path) -> Option<VersionRecord> {
        self.records.remove(original)
    }

    /// Iterate over all records in path order
    pub fn records(&self) -> impl Iterator<Item = &VersionRecord> {
        self.records.values()
    }

    /// Mutable access to a record, for retention trimming
    pub(crate) fn record_mut(&mut self, original: &Path) -> Option<&mut VersionRecord> {
        self.records.get_mut(original)
    }

    /// Drop a record if it has become empty
    pub(crate) fn drop_if_empty(&mut self, original: &Path) {
        if self.records.get(original).is_some_and(VersionRecord::is_empty) {
            self.records.remove(original);
        }
    }

    /// Records whose original path matches every keyword of `query`
    ///
    /// Keywords are whitespace/comma-delimited, matched as case-insensitive
    /// substrings of the original path. An empty query returns everything.
    pub fn search(&self, query: &str) -> Vec<&VersionRecord> {
        self.records
            .values()
            .filter(|r| contains_all_keywords(&r.original_path.to_string_lossy(), query))
            .collect()
    }

    /// Every `(original path, timestamp)` pair across the whole index
    pub fn all_versions(&self) -> Vec<(PathBuf, NaiveDateTime)> {
        self.records
            .values()
            .flat_map(|r| {
                r.versions
                    .iter()
                    .map(|ts| (r.original_path.clone(), *ts))
            })
            .collect()
    }
}

/// Rebuild an index from the backup root
///
/// Walks the root recursively, decoding every regular file name. Files
/// without a valid version marker are skipped, as are entries that raise
/// permission errors; neither is fatal. This is the system's sole recovery
/// mechanism after an unclean shutdown or manual tampering, and it is
/// idempotent.
pub fn rebuild_from_disk(root: &Path) -> Result<VersionIndex> {
    info!("rebuilding version index from {:?}", root);
    let mut index = VersionIndex::new();

    if !root.is_dir() {
        debug!("backup root {:?} does not exist yet; index is empty", root);
        return Ok(index);
    }

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match codec::original_path(root, entry.path()) {
            Ok((original, timestamp)) => {
                index.insert_version(&original, timestamp);
            }
            Err(e) => {
                trace!("skipping non-backup file {:?}: {}", entry.path(), e);
            }
        }
    }

    info!(
        "rebuilt index: {} files, {} versions",
        index.len(),
        index.version_count()
    );
    Ok(index)
}

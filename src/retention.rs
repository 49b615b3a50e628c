//! Two-tier retention: per-file version cap and global byte-size cap
//!
//! Enforcement deletes deterministically oldest-first. The per-file pass
//! trims a single record after each insert; the global pass collects every
//! `(original path, timestamp)` pair across the index, sorts ascending by
//! timestamp, and evicts until the store fits under the byte cap. Index
//! mutations happen under short write-lock sections; file deletion and
//! size accounting run outside the lock and are best-effort, with a rescan
//! as the reconciliation mechanism.

use crate::codec;
use crate::history::TodayHistory;
use crate::index::VersionIndex;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Retention limits, derived from settings on every enforcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum versions kept per original file, always at least 1
    pub max_versions_per_file: usize,
    /// Global byte cap across the whole store; 0 disables the check
    pub max_total_bytes: u64,
}

impl RetentionPolicy {
    /// Build a policy from the raw settings values
    ///
    /// The per-file cap is clamped to a minimum of 1; the size limit is
    /// given in megabytes, 0 meaning unlimited.
    pub fn new(max_versions_per_file: u32, max_size_mb: u64) -> RetentionPolicy {
        RetentionPolicy {
            max_versions_per_file: max_versions_per_file.max(1) as usize,
            max_total_bytes: max_size_mb * 1024 * 1024,
        }
    }

    /// Whether the global byte cap is active
    pub fn global_cap_enabled(&self) -> bool {
        self.max_total_bytes > 0
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::new(256, 1024 * 10)
    }
}

/// Applies retention against the shared index, store, and today history
#[derive(Debug, Clone)]
pub struct RetentionEnforcer {
    index: Arc<RwLock<VersionIndex>>,
    history: Arc<TodayHistory>,
}

impl RetentionEnforcer {
    /// Create an enforcer bound to the shared index and history
    pub fn new(index: Arc<RwLock<VersionIndex>>, history: Arc<TodayHistory>) -> RetentionEnforcer {
        RetentionEnforcer { index, history }
    }

    /// Trim one record to the per-file cap, oldest versions first
    ///
    /// Removes excess timestamps from the record under the write lock, then
    /// deletes their backup files (ignoring delete failures) and drops any
    /// today-history entries referencing them. Returns the number of
    /// versions evicted.
    pub fn enforce_per_file(
        &self,
        root: &Path,
        original: &Path,
        policy: &RetentionPolicy,
    ) -> usize {
        let removed: Vec<NaiveDateTime> = {
            let mut index = self.index.write();
            let Some(record) = index.record_mut(original) else {
                return 0;
            };

            let excess = record.len().saturating_sub(policy.max_versions_per_file);
            if excess == 0 {
                return 0;
            }
            let removed: Vec<_> = record.versions.drain(..excess).collect();
            index.drop_if_empty(original);
            removed
        };

        for timestamp in &removed {
            let backup = codec::backup_path(root, original, *timestamp);
            delete_backup_file(&backup);
            self.history.remove(original, *timestamp);
        }

        debug!(
            "per-file retention evicted {} version(s) of {:?}",
            removed.len(),
            original
        );
        removed.len()
    }

    /// Evict oldest versions across the whole store until it fits the cap
    ///
    /// No-op when the cap is disabled or the store already fits. A newer
    /// version is never evicted while an older one of any file remains.
    /// Sizes come from a best-effort stat; a missing file contributes zero
    /// and does not block progress. Returns the number of versions evicted.
    pub fn enforce_global(&self, root: &Path, policy: &RetentionPolicy) -> usize {
        if !policy.global_cap_enabled() {
            return 0;
        }

        // Snapshot and stat outside the lock
        let pairs = self.index.read().all_versions();
        let mut candidates: Vec<(NaiveDateTime, PathBuf, PathBuf, u64)> = pairs
            .into_iter()
            .map(|(original, timestamp)| {
                let backup = codec::backup_path(root, &original, timestamp);
                let size = fs::metadata(&backup).map(|m| m.len()).unwrap_or(0);
                (timestamp, original, backup, size)
            })
            .collect();

        let mut total: u64 = candidates.iter().map(|c| c.3).sum();
        if total <= policy.max_total_bytes {
            return 0;
        }

        // Oldest absolute time first; ties fall back to path order
        candidates.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

        let mut evicted = 0;
        for (timestamp, original, backup, size) in candidates {
            if total <= policy.max_total_bytes {
                break;
            }

            delete_backup_file(&backup);
            self.index.write().remove_version(&original, timestamp);
            self.history.remove(&original, timestamp);

            total = total.saturating_sub(size);
            evicted += 1;
        }

        debug!(
            "global retention evicted {} version(s); store now ~{} bytes",
            evicted, total
        );
        evicted
    }
}

/// Best-effort removal of a backup file; failures are logged and ignored
fn delete_backup_file(backup: &Path) {
    match fs::remove_file(backup) {
        Ok(()) => trace!("deleted backup file {:?}", backup),
        Err(e) => warn!("could not delete backup file {:?}: {}", backup, e),
    }
}

//! The backup pipeline: one candidate file in, at most one version out
//!
//! Every stage runs on the calling watcher thread. The shared index lock
//! is taken only for the in-memory insert; the copy itself and retention's
//! file deletions run outside it. A failed copy leaves the index untouched,
//! so the store and the index never disagree about a version that was not
//! actually written.

use crate::codec;
use crate::history::TodayHistory;
use crate::index::VersionIndex;
use crate::oplog::OperationLog;
use crate::pause::PauseController;
use crate::retention::RetentionEnforcer;
use crate::settings::Settings;
use crate::types::{PipelineOutcome, SkipReason, TodayHistoryEntry};
use chrono::{Local, Timelike};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns filtered change events into versions in the backup store
pub struct BackupPipeline {
    index: Arc<RwLock<VersionIndex>>,
    history: Arc<TodayHistory>,
    pause: Arc<PauseController>,
    settings: Arc<RwLock<Settings>>,
    oplog: Arc<OperationLog>,
    enforcer: RetentionEnforcer,
}

impl BackupPipeline {
    /// Wire the pipeline to the engine's shared collaborators
    pub fn new(
        index: Arc<RwLock<VersionIndex>>,
        history: Arc<TodayHistory>,
        pause: Arc<PauseController>,
        settings: Arc<RwLock<Settings>>,
        oplog: Arc<OperationLog>,
    ) -> BackupPipeline {
        let enforcer = RetentionEnforcer::new(index.clone(), history.clone());
        BackupPipeline {
            index,
            history,
            pause,
            settings,
            oplog,
            enforcer,
        }
    }

    /// Current backup root, if configured
    ///
    /// Watchers use this to keep the store itself out of the event stream.
    pub fn backup_root(&self) -> Option<PathBuf> {
        self.settings.read().backup_root.clone()
    }

    /// Back up one file that already passed debouncing and filtering
    ///
    /// Skips are quiet (paused, no backup root configured, or the path is
    /// not a regular file). Copy failures are reported to the operation log
    /// and leave the index unchanged. On success the version is indexed,
    /// retention runs, and today's history is updated.
    pub fn process_candidate(&self, full_path: &Path) -> PipelineOutcome {
        if self.pause.is_paused() {
            debug!("skipping {:?}: {}", full_path, SkipReason::Paused.as_str());
            return PipelineOutcome::Skipped(SkipReason::Paused);
        }

        let (root, policy) = {
            let settings = self.settings.read();
            (settings.backup_root.clone(), settings.retention_policy())
        };
        let Some(root) = root else {
            debug!(
                "skipping {:?}: {}",
                full_path,
                SkipReason::NoBackupRoot.as_str()
            );
            return PipelineOutcome::Skipped(SkipReason::NoBackupRoot);
        };

        // Directories, symlinks, and files already gone by now are not
        // backup material
        match fs::metadata(full_path) {
            Ok(meta) if meta.is_file() => {}
            _ => {
                debug!(
                    "skipping {:?}: {}",
                    full_path,
                    SkipReason::NotARegularFile.as_str()
                );
                return PipelineOutcome::Skipped(SkipReason::NotARegularFile);
            }
        }

        // Wall-clock seconds; the encoded name carries no finer resolution
        let now = Local::now().naive_local();
        let timestamp = now.with_nanosecond(0).unwrap_or(now);
        let backup = codec::backup_path(&root, full_path, timestamp);

        if let Err(e) = backup
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::copy(full_path, &backup).map(|_| ()))
        {
            let reason = format!("copy to {:?} failed: {}", backup, e);
            self.oplog.failure(full_path, &reason);
            return PipelineOutcome::Failed(reason);
        }

        self.index.write().insert_version(full_path, timestamp);
        self.enforcer.enforce_per_file(&root, full_path, &policy);

        self.history.record(TodayHistoryEntry {
            original_path: full_path.to_path_buf(),
            timestamp,
            backup_path: backup.clone(),
        });

        self.enforcer.enforce_global(&root, &policy);

        info!("backed up {:?} -> {:?}", full_path, backup);
        self.oplog.success(full_path, format!("backed up to {:?}", backup));
        PipelineOutcome::BackedUp(backup)
    }

    /// The retention enforcer bound to this pipeline's index and history
    pub fn enforcer(&self) -> &RetentionEnforcer {
        &self.enforcer
    }
}

impl std::fmt::Debug for BackupPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupPipeline")
            .field("index", &self.index.read().len())
            .field("paused", &self.pause.is_paused())
            .finish()
    }
}

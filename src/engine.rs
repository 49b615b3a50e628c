//! The engine facade tying index, watchers, retention, and history together
//!
//! [`BackupEngine`] owns every shared collaborator and is the only type a
//! frontend needs to hold. All methods are callable from any thread; the
//! engine keeps its own locking discipline (no lock is held across file
//! I/O) so the UI never blocks behind a copy in progress.

use crate::codec;
use crate::difftool;
use crate::error::{KeepsakeError, Result};
use crate::history::{DayCountCallback, TodayHistory};
use crate::index::{self, VersionIndex};
use crate::oplog::{OperationLog, OperationRecord};
use crate::pause::PauseController;
use crate::pipeline::BackupPipeline;
use crate::settings::Settings;
use crate::types::{TodayHistoryEntry, VersionRecord};
use crate::watcher::{FolderWatcher, NotifyWatcher, WatcherHandle};
use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Continuous folder-backup engine
///
/// Construct one per settings store, call [`scan_backup_folder`] to build
/// the version index from disk, then [`start_watchers`] to begin taking
/// versions as files change.
///
/// [`scan_backup_folder`]: BackupEngine::scan_backup_folder
/// [`start_watchers`]: BackupEngine::start_watchers
pub struct BackupEngine {
    settings: Arc<RwLock<Settings>>,
    index: Arc<RwLock<VersionIndex>>,
    history: Arc<TodayHistory>,
    pause: Arc<PauseController>,
    oplog: Arc<OperationLog>,
    pipeline: Arc<BackupPipeline>,
    watchers: Mutex<Vec<WatcherHandle>>,
}

impl BackupEngine {
    /// Build an engine around shared settings
    ///
    /// The index starts empty; call [`BackupEngine::scan_backup_folder`] to
    /// populate it from the store on disk.
    pub fn new(settings: Arc<RwLock<Settings>>) -> BackupEngine {
        let index = Arc::new(RwLock::new(VersionIndex::new()));
        let history = Arc::new(TodayHistory::new());
        let pause = Arc::new(PauseController::new());
        let oplog = Arc::new(OperationLog::new());
        let pipeline = Arc::new(BackupPipeline::new(
            index.clone(),
            history.clone(),
            pause.clone(),
            settings.clone(),
            oplog.clone(),
        ));

        BackupEngine {
            settings,
            index,
            history,
            pause,
            oplog,
            pipeline,
            watchers: Mutex::new(Vec::new()),
        }
    }

    fn backup_root(&self) -> Result<PathBuf> {
        self.settings
            .read()
            .backup_root
            .clone()
            .ok_or_else(|| KeepsakeError::config("no backup folder configured"))
    }

    /// Rebuild the version index by walking the backup store
    ///
    /// The new index is built aside and swapped in atomically, then
    /// retention is enforced against it and today's history is rebuilt.
    /// Returns the number of versions indexed after retention.
    pub fn scan_backup_folder(&self) -> Result<usize> {
        let root = self.backup_root()?;
        let rebuilt = index::rebuild_from_disk(&root)?;
        info!(
            "scan found {} version(s) across {} file(s)",
            rebuilt.version_count(),
            rebuilt.len()
        );

        let originals: Vec<PathBuf> = rebuilt
            .records()
            .map(|r| r.original_path.clone())
            .collect();
        *self.index.write() = rebuilt;

        let policy = self.settings.read().retention_policy();
        let enforcer = self.pipeline.enforcer();
        for original in &originals {
            enforcer.enforce_per_file(&root, original, &policy);
        }
        enforcer.enforce_global(&root, &policy);

        let count = {
            let index = self.index.read();
            self.history.rebuild(&index, &root);
            index.version_count()
        };
        Ok(count)
    }

    /// Records whose original path contains every whitespace-separated
    /// keyword of `query`; an empty query returns everything
    pub fn records(&self, query: &str) -> Vec<VersionRecord> {
        self.index
            .read()
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// All versions known for one original file
    pub fn versions_of(&self, original: &Path) -> Option<VersionRecord> {
        self.index.read().record(original).cloned()
    }

    /// Today's successful backups, most recent first
    pub fn today_history(&self) -> Vec<TodayHistoryEntry> {
        self.history.entries()
    }

    /// Number of backups taken today
    pub fn backups_today(&self) -> u64 {
        self.history.backups_today()
    }

    /// Register the observer for the day's backup count
    pub fn on_day_count_changed(&self, callback: DayCountCallback) {
        self.history.set_day_count_callback(callback);
    }

    /// Recent operations, most recent first
    pub fn operation_log(&self) -> Vec<OperationRecord> {
        self.oplog.recent()
    }

    /// Start one watcher per configured folder, stopping any running first
    ///
    /// A folder that cannot be watched is reported to the operation log and
    /// skipped; the remaining folders still get their watchers.
    pub fn start_watchers(&self) -> Result<()> {
        self.stop_watchers();

        let folders = self.settings.read().watched.clone();
        let mut handles = self.watchers.lock();
        for folder in folders {
            let opened = NotifyWatcher::open(&folder.path, folder.include_subfolders);
            let (source, control) = match opened {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("cannot watch {:?}: {}", folder.path, e);
                    self.oplog
                        .failure(&folder.path, format!("cannot watch folder: {}", e));
                    continue;
                }
            };

            match FolderWatcher::spawn(Box::new(source), folder.clone(), self.pipeline.clone()) {
                Ok(join) => handles.push(WatcherHandle::new(Some(control), join)),
                Err(e) => {
                    warn!("cannot start watcher for {:?}: {}", folder.path, e);
                    self.oplog
                        .failure(&folder.path, format!("cannot start watcher: {}", e));
                }
            }
        }

        info!("{} watcher(s) running", handles.len());
        Ok(())
    }

    /// Stop all watchers and wait for their threads
    pub fn stop_watchers(&self) {
        let handles: Vec<WatcherHandle> = self.watchers.lock().drain(..).collect();
        for handle in handles {
            handle.stop();
        }
    }

    /// Stop and start watchers, picking up folder or filter changes
    pub fn restart_watchers(&self) -> Result<()> {
        self.start_watchers()
    }

    /// Delete one version: its file, its index entry, its history entry
    pub fn delete_version(&self, original: &Path, timestamp: NaiveDateTime) -> Result<()> {
        let root = self.backup_root()?;

        let known = self
            .index
            .read()
            .record(original)
            .is_some_and(|r| r.versions.contains(&timestamp));
        if !known {
            return Err(KeepsakeError::VersionNotFound {
                path: original.to_path_buf(),
                timestamp: timestamp.format(codec::TIMESTAMP_FORMAT).to_string(),
            });
        }

        let backup = codec::backup_path(&root, original, timestamp);
        match fs::remove_file(&backup) {
            Ok(()) => {}
            // Already gone on disk; still drop it from the index
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.index.write().remove_version(original, timestamp);
        self.history.remove(original, timestamp);
        info!("deleted version {:?} of {:?}", timestamp, original);
        Ok(())
    }

    /// Delete every version of one original file; returns how many
    pub fn delete_file_versions(&self, original: &Path) -> Result<usize> {
        let root = self.backup_root()?;

        let Some(record) = self.index.write().remove_record(original) else {
            return Ok(0);
        };

        for timestamp in &record.versions {
            let backup = codec::backup_path(&root, original, *timestamp);
            if let Err(e) = fs::remove_file(&backup) {
                warn!("could not delete {:?}: {}", backup, e);
            }
            self.history.remove(original, *timestamp);
        }

        info!(
            "deleted all {} version(s) of {:?}",
            record.versions.len(),
            original
        );
        Ok(record.versions.len())
    }

    /// Pause backups for the configured duration; 0 minutes is indefinite
    pub fn pause(&self) {
        let minutes = self.settings.read().pause_minutes;
        if minutes == 0 {
            self.pause.pause();
        } else {
            self.pause.pause_for(Duration::from_secs(u64::from(minutes) * 60));
        }
    }

    /// Resume backups immediately
    pub fn resume(&self) {
        self.pause.resume();
    }

    /// Whether backups are currently paused
    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Open the configured diff tool on two versions of one file
    ///
    /// The versions are passed oldest first regardless of argument order.
    pub fn launch_diff(
        &self,
        original: &Path,
        first: NaiveDateTime,
        second: NaiveDateTime,
    ) -> Result<()> {
        let root = self.backup_root()?;
        let tool = self.settings.read().diff_tool_path.clone();

        let (older, newer) = if first <= second {
            (first, second)
        } else {
            (second, first)
        };
        difftool::launch_diff_tool(
            tool.as_deref(),
            &codec::backup_path(&root, original, older),
            &codec::backup_path(&root, original, newer),
        )
    }

    /// The pipeline driving watcher candidates, for direct injection
    pub fn pipeline(&self) -> Arc<BackupPipeline> {
        self.pipeline.clone()
    }
}

impl Drop for BackupEngine {
    fn drop(&mut self) {
        self.stop_watchers();
    }
}

impl std::fmt::Debug for BackupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupEngine")
            .field("files", &self.index.read().len())
            .field("versions", &self.index.read().version_count())
            .field("watchers", &self.watchers.lock().len())
            .field("paused", &self.pause.is_paused())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn ts(s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(12, 0, s)
            .unwrap()
    }

    fn engine_with_root(root: &Path) -> BackupEngine {
        let settings = Arc::new(RwLock::new(Settings {
            backup_root: Some(root.to_path_buf()),
            ..Settings::default()
        }));
        BackupEngine::new(settings)
    }

    fn seed_backup(root: &Path, original: &Path, timestamp: NaiveDateTime) -> PathBuf {
        let backup = codec::backup_path(root, original, timestamp);
        fs::create_dir_all(backup.parent().unwrap()).unwrap();
        fs::write(&backup, "seed").unwrap();
        backup
    }

    #[test]
    fn test_scan_populates_index_from_disk() {
        let store = TempDir::new().unwrap();
        let original = PathBuf::from("/w/a.txt");
        seed_backup(store.path(), &original, ts(1));
        seed_backup(store.path(), &original, ts(2));

        let engine = engine_with_root(store.path());
        let count = engine.scan_backup_folder().unwrap();
        assert_eq!(count, 2);

        let record = engine.versions_of(&original).unwrap();
        assert_eq!(record.versions, vec![ts(1), ts(2)]);
    }

    #[test]
    fn test_scan_without_root_is_config_error() {
        let engine = BackupEngine::new(Arc::new(RwLock::new(Settings::default())));
        assert!(engine.scan_backup_folder().unwrap_err().is_config());
    }

    #[test]
    fn test_delete_version_removes_file_and_entry() {
        let store = TempDir::new().unwrap();
        let original = PathBuf::from("/w/a.txt");
        let backup = seed_backup(store.path(), &original, ts(1));
        seed_backup(store.path(), &original, ts(2));

        let engine = engine_with_root(store.path());
        engine.scan_backup_folder().unwrap();

        engine.delete_version(&original, ts(1)).unwrap();
        assert!(!backup.exists());
        assert_eq!(engine.versions_of(&original).unwrap().versions, vec![ts(2)]);
    }

    #[test]
    fn test_delete_unknown_version_errors() {
        let store = TempDir::new().unwrap();
        let engine = engine_with_root(store.path());

        let err = engine
            .delete_version(Path::new("/w/a.txt"), ts(1))
            .unwrap_err();
        assert!(matches!(err, KeepsakeError::VersionNotFound { .. }));
    }

    #[test]
    fn test_delete_file_versions_drops_record() {
        let store = TempDir::new().unwrap();
        let original = PathBuf::from("/w/a.txt");
        seed_backup(store.path(), &original, ts(1));
        seed_backup(store.path(), &original, ts(2));

        let engine = engine_with_root(store.path());
        engine.scan_backup_folder().unwrap();

        assert_eq!(engine.delete_file_versions(&original).unwrap(), 2);
        assert!(engine.versions_of(&original).is_none());
        assert_eq!(engine.delete_file_versions(&original).unwrap(), 0);
    }

    #[test]
    fn test_records_query_filters_by_keywords() {
        let store = TempDir::new().unwrap();
        seed_backup(store.path(), Path::new("/w/report.txt"), ts(1));
        seed_backup(store.path(), Path::new("/w/notes.md"), ts(2));

        let engine = engine_with_root(store.path());
        engine.scan_backup_folder().unwrap();

        assert_eq!(engine.records("").len(), 2);
        let hits = engine.records("report");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].original_path, PathBuf::from("/w/report.txt"));
    }

    #[test]
    fn test_pause_zero_minutes_is_indefinite() {
        let store = TempDir::new().unwrap();
        let settings = Arc::new(RwLock::new(Settings {
            backup_root: Some(store.path().to_path_buf()),
            pause_minutes: 0,
            ..Settings::default()
        }));
        let engine = BackupEngine::new(settings);

        engine.pause();
        assert!(engine.is_paused());
        assert!(engine.pause.remaining().is_none());
        engine.resume();
        assert!(!engine.is_paused());
    }

    #[test]
    fn test_scan_applies_retention() {
        let store = TempDir::new().unwrap();
        let original = PathBuf::from("/w/a.txt");
        for s in 1..=4 {
            seed_backup(store.path(), &original, ts(s));
        }

        let settings = Arc::new(RwLock::new(Settings {
            backup_root: Some(store.path().to_path_buf()),
            max_backups_per_file: 2,
            ..Settings::default()
        }));
        let engine = BackupEngine::new(settings);

        assert_eq!(engine.scan_backup_folder().unwrap(), 2);
        let record = engine.versions_of(&original).unwrap();
        assert_eq!(record.versions, vec![ts(3), ts(4)]);
        assert!(!codec::backup_path(store.path(), &original, ts(1)).exists());
    }
}

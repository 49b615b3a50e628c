//! Integration tests for end-to-end watcher and engine scenarios
//!
//! The watcher chain is exercised two ways: with a scripted event source
//! for determinism, and once against the real OS watcher with generous
//! sleeps as a smoke test.

use ::keepsake::codec;
use ::keepsake::watcher::DirectoryWatcher;
use ::keepsake::*;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Feeds a fixed sequence of batches, then reports stopped
struct ScriptedWatcher {
    batches: VecDeque<Vec<ChangeEvent>>,
}

impl ScriptedWatcher {
    fn new(batches: Vec<Vec<ChangeEvent>>) -> ScriptedWatcher {
        ScriptedWatcher {
            batches: batches.into(),
        }
    }
}

impl DirectoryWatcher for ScriptedWatcher {
    fn next_batch(&mut self) -> Result<Option<Vec<ChangeEvent>>> {
        Ok(self.batches.pop_front())
    }
}

fn engine_for(root: &Path) -> BackupEngine {
    BackupEngine::new(Arc::new(RwLock::new(Settings {
        backup_root: Some(root.to_path_buf()),
        ..Settings::default()
    })))
}

#[test]
fn test_scripted_end_to_end_versions_and_history() {
    let store = TempDir::new().unwrap();
    let watched = TempDir::new().unwrap();

    let report = watched.path().join("report.txt");
    let temp = watched.path().join("scratch.tmp");
    fs::write(&report, "draft one").unwrap();
    fs::write(&temp, "junk").unwrap();

    let engine = engine_for(store.path());
    let source = ScriptedWatcher::new(vec![vec![
        ChangeEvent::new(report.clone(), ChangeAction::Created),
        ChangeEvent::new(temp.clone(), ChangeAction::Created),
    ]]);

    let mut folder = WatchedFolder::new(watched.path());
    folder.exclude_filters = "*.tmp".into();
    let join = FolderWatcher::spawn(Box::new(source), folder, engine.pipeline()).unwrap();
    join.join().unwrap();

    // Only the report was versioned, and it shows up in today's history
    let record = engine.versions_of(&report).unwrap();
    assert_eq!(record.len(), 1);
    assert!(engine.versions_of(&temp).is_none());
    assert_eq!(engine.backups_today(), 1);

    let history = engine.today_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].original_path, report);
    assert!(history[0].backup_path.exists());

    // The operation log saw the success
    let ops = engine.operation_log();
    assert_eq!(ops.len(), 1);
    assert!(ops[0].success);
}

#[test]
fn test_scan_is_idempotent() {
    let store = TempDir::new().unwrap();
    let watched = TempDir::new().unwrap();
    let file = watched.path().join("notes.txt");
    fs::write(&file, "hello").unwrap();

    let engine = engine_for(store.path());
    assert!(matches!(
        engine.pipeline().process_candidate(&file),
        PipelineOutcome::BackedUp(_)
    ));

    let first = engine.scan_backup_folder().unwrap();
    let records_first = engine.records("");
    let second = engine.scan_backup_folder().unwrap();
    let records_second = engine.records("");

    assert_eq!(first, second);
    assert_eq!(records_first, records_second);
}

#[test]
fn test_scan_reconciles_manual_store_edits() {
    let store = TempDir::new().unwrap();
    let watched = TempDir::new().unwrap();
    let file = watched.path().join("notes.txt");
    fs::write(&file, "hello").unwrap();

    let engine = engine_for(store.path());
    let PipelineOutcome::BackedUp(backup) = engine.pipeline().process_candidate(&file) else {
        panic!("expected a backup");
    };
    assert_eq!(engine.scan_backup_folder().unwrap(), 1);

    // A user deletes the version file by hand; the next scan notices
    fs::remove_file(&backup).unwrap();
    assert_eq!(engine.scan_backup_folder().unwrap(), 0);
    assert!(engine.versions_of(&file).is_none());
    assert_eq!(engine.backups_today(), 0);
}

#[test]
fn test_global_cap_keeps_newest_versions() {
    let store = TempDir::new().unwrap();
    let settings = Arc::new(RwLock::new(Settings {
        backup_root: Some(store.path().to_path_buf()),
        max_backup_size_mb: 1,
        ..Settings::default()
    }));
    let engine = BackupEngine::new(settings);

    // Seed three half-megabyte versions by hand; only two fit under 1 MB
    let original = Path::new("/w/big.bin");
    let day = chrono::NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
    let stamps: Vec<_> = (1..=3)
        .map(|s| day.and_hms_opt(9, 0, s).unwrap())
        .collect();
    for stamp in &stamps {
        let backup = codec::backup_path(store.path(), original, *stamp);
        fs::create_dir_all(backup.parent().unwrap()).unwrap();
        fs::write(&backup, vec![0u8; 512 * 1024]).unwrap();
    }

    assert_eq!(engine.scan_backup_folder().unwrap(), 2);
    let record = engine.versions_of(original).unwrap();
    assert_eq!(record.versions, &stamps[1..]);
    assert!(!codec::backup_path(store.path(), original, stamps[0]).exists());
}

#[test]
fn test_paused_engine_takes_no_versions() {
    let store = TempDir::new().unwrap();
    let watched = TempDir::new().unwrap();
    let file = watched.path().join("notes.txt");
    fs::write(&file, "hello").unwrap();

    let engine = engine_for(store.path());
    engine.pause();

    let source = ScriptedWatcher::new(vec![vec![ChangeEvent::new(
        file.clone(),
        ChangeAction::Modified,
    )]]);
    let join = FolderWatcher::spawn(
        Box::new(source),
        WatchedFolder::new(watched.path()),
        engine.pipeline(),
    )
    .unwrap();
    join.join().unwrap();

    assert!(engine.versions_of(&file).is_none());

    // After resuming, the same change goes through
    engine.resume();
    assert!(matches!(
        engine.pipeline().process_candidate(&file),
        PipelineOutcome::BackedUp(_)
    ));
}

#[test]
fn test_day_count_callback_follows_backups() {
    use std::sync::atomic::{AtomicU64, Ordering};

    let store = TempDir::new().unwrap();
    let watched = TempDir::new().unwrap();
    let file = watched.path().join("notes.txt");
    fs::write(&file, "hello").unwrap();

    let engine = engine_for(store.path());
    let seen = Arc::new(AtomicU64::new(0));
    let seen_clone = seen.clone();
    engine.on_day_count_changed(Box::new(move |count| {
        seen_clone.store(count, Ordering::SeqCst);
    }));

    engine.pipeline().process_candidate(&file);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_live_watcher_smoke() {
    let store = TempDir::new().unwrap();
    let watched = TempDir::new().unwrap();

    let settings = Arc::new(RwLock::new(Settings {
        backup_root: Some(store.path().to_path_buf()),
        watched: vec![WatchedFolder::new(watched.path())],
        ..Settings::default()
    }));
    let engine = BackupEngine::new(settings);
    engine.start_watchers().unwrap();

    // Give the OS watch a moment to arm, then create a file
    std::thread::sleep(Duration::from_millis(300));
    let file = watched.path().join("live.txt");
    fs::write(&file, "live").unwrap();
    std::thread::sleep(Duration::from_millis(700));

    engine.stop_watchers();
    assert!(engine.versions_of(&file).is_some());
}

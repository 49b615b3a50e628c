//! Main test module for Keepsake
//!
//! This module includes all test suites:
//! - Integration tests for end-to-end watcher and engine scenarios
//! - Property-based tests for the version-name codec invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::keepsake::codec;
    use ::keepsake::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use parking_lot::RwLock;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn ts(s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 8)
            .unwrap()
            .and_hms_opt(10, 0, s)
            .unwrap()
    }

    fn engine_for(root: &Path) -> BackupEngine {
        BackupEngine::new(Arc::new(RwLock::new(Settings {
            backup_root: Some(root.to_path_buf()),
            ..Settings::default()
        })))
    }

    #[test]
    fn test_file_without_extension() {
        let store = TempDir::new().unwrap();
        let watched = TempDir::new().unwrap();
        let file = watched.path().join("Makefile");
        fs::write(&file, "all:").unwrap();

        let engine = engine_for(store.path());
        let outcome = engine.pipeline().process_candidate(&file);
        let PipelineOutcome::BackedUp(backup) = outcome else {
            panic!("expected a backup");
        };

        // The version name has no extension either
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Makefile_backup_"));
        assert!(!name.contains('.'));

        // And the scan maps it back to the original path
        let count = engine.scan_backup_folder().unwrap();
        assert_eq!(count, 1);
        assert!(engine.versions_of(&file).is_some());
    }

    #[test]
    fn test_stem_containing_the_version_marker() {
        let store = TempDir::new().unwrap();
        let watched = TempDir::new().unwrap();
        let file = watched.path().join("db_backup_notes.txt");
        fs::write(&file, "tricky").unwrap();

        let engine = engine_for(store.path());
        assert!(matches!(
            engine.pipeline().process_candidate(&file),
            PipelineOutcome::BackedUp(_)
        ));

        engine.scan_backup_folder().unwrap();
        let record = engine.versions_of(&file).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.original_path, file);
    }

    #[test]
    fn test_deeply_nested_original() {
        let store = TempDir::new().unwrap();
        let watched = TempDir::new().unwrap();
        let file = watched.path().join("a/b/c/d/e/notes.txt");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "deep").unwrap();

        let engine = engine_for(store.path());
        assert!(matches!(
            engine.pipeline().process_candidate(&file),
            PipelineOutcome::BackedUp(_)
        ));

        engine.scan_backup_folder().unwrap();
        assert!(engine.versions_of(&file).is_some());
    }

    #[test]
    fn test_stray_files_in_store_are_ignored_by_scan() {
        let store = TempDir::new().unwrap();
        fs::write(store.path().join("README.txt"), "not a version").unwrap();
        fs::create_dir_all(store.path().join("w")).unwrap();
        let good = store
            .path()
            .join("w/a_backup_2024_07_08__10_00_01.txt");
        fs::write(&good, "version").unwrap();

        let engine = engine_for(store.path());
        assert_eq!(engine.scan_backup_folder().unwrap(), 1);
        assert_eq!(engine.records("").len(), 1);
    }

    #[test]
    fn test_delete_version_tolerates_missing_file() {
        let store = TempDir::new().unwrap();
        let original = PathBuf::from("/w/a.txt");
        let backup = codec::backup_path(store.path(), &original, ts(1));
        fs::create_dir_all(backup.parent().unwrap()).unwrap();
        fs::write(&backup, "v").unwrap();

        let engine = engine_for(store.path());
        engine.scan_backup_folder().unwrap();

        // Someone deleted the file behind our back
        fs::remove_file(&backup).unwrap();
        engine.delete_version(&original, ts(1)).unwrap();
        assert!(engine.versions_of(&original).is_none());
    }
}

//! # Keepsake - Continuous folder backups
//!
//! A file-versioning engine that watches folders and copies every changed
//! file into a timestamped version the moment it settles.
//!
//! ## Overview
//!
//! Keepsake keeps a backup store alongside your working folders, allowing
//! you to:
//! - Watch any number of folders, recursively or flat, with include and
//!   exclude filters
//! - Collapse editor save-bursts into a single version per file
//! - Keep the store bounded with a per-file version cap and a global size
//!   cap, evicting oldest first
//! - Rebuild the whole version index from nothing but the file names in
//!   the store
//! - Browse today's backups, search versions by keyword, and diff any two
//!   versions with an external tool
//!
//! ## Architecture
//!
//! Everything hangs off [`BackupEngine`]:
//!
//! - **Name codec**: a version's original path and timestamp are encoded
//!   entirely in its file name and location under the store, so the store
//!   needs no manifest and survives manual edits
//! - **Watcher threads**: one thread per watched folder drives a
//!   debounce-filter-pipeline chain; the OS watcher is behind a trait so
//!   tests can script event sequences deterministically
//! - **Version index**: an in-memory map from original path to sorted
//!   timestamps, rebuilt from disk on demand
//! - **Retention**: enforced after every backup and every rescan, never
//!   holding the index lock across file deletion
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keepsake::{BackupEngine, Settings, WatchedFolder};
//! use parking_lot::RwLock;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # fn main() -> keepsake::Result<()> {
//! let settings = Arc::new(RwLock::new(Settings {
//!     backup_root: Some(PathBuf::from("/backups")),
//!     watched: vec![WatchedFolder::new("/home/me/documents")],
//!     ..Settings::default()
//! }));
//!
//! let engine = BackupEngine::new(settings);
//! engine.scan_backup_folder()?;
//! engine.start_watchers()?;
//!
//! // ... files change, versions appear ...
//!
//! println!("{} backups today", engine.backups_today());
//! engine.stop_watchers();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod debounce;
pub mod difftool;
pub mod engine;
pub mod error;
pub mod filter;
pub mod history;
pub mod index;
pub mod oplog;
pub mod pause;
pub mod pipeline;
pub mod retention;
pub mod settings;
pub mod types;
pub mod watcher;

pub use engine::BackupEngine;
pub use error::{KeepsakeError, Result};
pub use filter::FilterSet;
pub use history::TodayHistory;
pub use index::VersionIndex;
pub use oplog::{OperationLog, OperationRecord};
pub use pause::PauseController;
pub use pipeline::BackupPipeline;
pub use retention::RetentionPolicy;
pub use settings::{Settings, SettingsStore};
pub use types::{
    ChangeAction, ChangeEvent, PipelineOutcome, SkipReason, TodayHistoryEntry, VersionRecord,
    WatchedFolder,
};
pub use watcher::{DirectoryWatcher, FolderWatcher, NotifyWatcher, WatcherHandle};

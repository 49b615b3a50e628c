//! Settings collaborator: the engine's read-mostly configuration
//!
//! The engine consumes `backup_root`, the retention limits, the pause
//! duration, the diff tool path, and the watched-folder list. UI edits
//! mutate the shared settings, call [`SettingsStore::mark_dirty`], and then
//! ask the engine to restart watchers or rescan. Persistence is JSON on
//! disk with a throttled save: writes wait for a short settling period
//! after the last change and are rate-limited, so rapid UI edits coalesce
//! into one write.

use crate::error::Result;
use crate::retention::RetentionPolicy;
use crate::types::WatchedFolder;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Settling time after the last change before a throttled save fires
const SAVE_SETTLE: Duration = Duration::from_millis(250);

/// Minimum interval between two throttled saves
const SAVE_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// Global engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory under which all versions are stored; unset refuses backups
    pub backup_root: Option<PathBuf>,
    /// Global store size limit in megabytes; 0 disables the check
    pub max_backup_size_mb: u64,
    /// Versions kept per original file; clamped to at least 1 when applied
    pub max_backups_per_file: u32,
    /// Default pause duration in minutes; 0 pauses indefinitely
    pub pause_minutes: u32,
    /// External diff tool launched against two versions
    pub diff_tool_path: Option<PathBuf>,
    /// Folders to watch
    pub watched: Vec<WatchedFolder>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            backup_root: None,
            max_backup_size_mb: 1024 * 10,
            max_backups_per_file: 256,
            pause_minutes: 30,
            diff_tool_path: None,
            watched: Vec::new(),
        }
    }
}

impl Settings {
    /// Retention limits derived from the current values
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.max_backups_per_file, self.max_backup_size_mb)
    }
}

#[derive(Debug, Default)]
struct ThrottleState {
    last_change: Option<Instant>,
    last_save: Option<Instant>,
}

/// Owns the settings file and the shared in-memory settings
pub struct SettingsStore {
    path: PathBuf,
    settings: Arc<RwLock<Settings>>,
    throttle: Mutex<ThrottleState>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable
    pub fn load(path: impl Into<PathBuf>) -> SettingsStore {
        let path = path.into();

        let settings = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Settings>(&text) {
                Ok(settings) => {
                    info!("loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("settings file {:?} is invalid ({}); using defaults", path, e);
                    Settings::default()
                }
            },
            Err(_) => {
                debug!("no settings file at {:?}; using defaults", path);
                Settings::default()
            }
        };

        SettingsStore {
            path,
            settings: Arc::new(RwLock::new(settings)),
            throttle: Mutex::new(ThrottleState::default()),
        }
    }

    /// Handle to the shared settings, for the engine and the UI
    pub fn settings(&self) -> Arc<RwLock<Settings>> {
        self.settings.clone()
    }

    /// Note that the settings changed; a later throttled save will persist
    pub fn mark_dirty(&self) {
        self.throttle.lock().last_change = Some(Instant::now());
    }

    /// Persist immediately, regardless of throttling
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.settings.read())?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;

        let mut throttle = self.throttle.lock();
        throttle.last_save = Some(Instant::now());
        debug!("settings saved to {:?}", self.path);
        Ok(())
    }

    /// Persist if dirty, settled, and not rate-limited
    ///
    /// Returns whether a save actually happened. Intended to be polled from
    /// the UI loop.
    pub fn maybe_save_throttled(&self) -> Result<bool> {
        let due = {
            let throttle = self.throttle.lock();
            let Some(last_change) = throttle.last_change else {
                return Ok(false);
            };

            let saved_since_change = throttle
                .last_save
                .is_some_and(|last_save| last_save >= last_change);
            let settled = last_change.elapsed() >= SAVE_SETTLE;
            let rate_ok = throttle
                .last_save
                .map_or(true, |last_save| last_save.elapsed() >= SAVE_MIN_INTERVAL);

            !saved_since_change && settled && rate_ok
        };

        if !due {
            return Ok(false);
        }

        self.save()?;
        Ok(true)
    }

    /// Location of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .finish()
    }
}

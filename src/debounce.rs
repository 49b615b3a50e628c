//! Per-watcher suppression of duplicate change notifications
//!
//! File systems deliver bursts of events for a single logical save. The
//! tracker records the last event tick per path and suppresses events that
//! arrive within the window. The tick is refreshed even on suppression, so
//! a sustained burst keeps re-arming the window instead of firing once the
//! window has elapsed mid-burst.
//!
//! State is private to each watcher thread; there is no cross-watcher
//! interaction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default suppression window between events for the same path
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Tracks the last event time per path for one watcher
#[derive(Debug)]
pub struct DebounceTracker {
    window: Duration,
    last_event: HashMap<PathBuf, Instant>,
}

impl DebounceTracker {
    /// Create a tracker with the default 500 ms window
    pub fn new() -> DebounceTracker {
        DebounceTracker::with_window(DEFAULT_DEBOUNCE_WINDOW)
    }

    /// Create a tracker with a custom window
    pub fn with_window(window: Duration) -> DebounceTracker {
        DebounceTracker {
            window,
            last_event: HashMap::new(),
        }
    }

    /// Record an event for `path` and decide whether to process it
    ///
    /// Returns `false` if a previous event for the same path was recorded
    /// less than the window ago. The recorded tick is refreshed either way.
    pub fn should_process(&mut self, path: &Path) -> bool {
        let now = Instant::now();

        match self.last_event.insert(path.to_path_buf(), now) {
            Some(previous) => now.duration_since(previous) >= self.window,
            None => true,
        }
    }

    /// Drop tracked paths whose window has long expired
    ///
    /// Keeps the map from growing without bound on churny folders. Safe to
    /// call at any cadence; suppression behavior is unaffected.
    pub fn prune(&mut self) {
        let cutoff = self.window * 4;
        let now = Instant::now();
        self.last_event
            .retain(|_, tick| now.duration_since(*tick) < cutoff);
    }

    /// Number of paths currently tracked
    pub fn len(&self) -> usize {
        self.last_event.len()
    }

    /// Whether no paths are tracked
    pub fn is_empty(&self) -> bool {
        self.last_event.is_empty()
    }
}

impl Default for DebounceTracker {
    fn default() -> Self {
        DebounceTracker::new()
    }
}

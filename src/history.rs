//! Today history: a day-scoped, most-recent-first log of successful backups
//!
//! A derived, UI-convenience view over the version index, guarded by its
//! own lock so readers never contend with index writers. The list resets
//! when the calendar day rolls over and can be rebuilt from the index at
//! any time. A registered callback is invoked with the day's backup count
//! whenever it changes, feeding the tray-icon collaborator.

use crate::codec;
use crate::index::VersionIndex;
use crate::types::TodayHistoryEntry;
use chrono::{Local, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Callback receiving the current day's backup count
pub type DayCountCallback = Box<dyn Fn(u64) + Send + Sync>;

#[derive(Debug)]
struct HistoryInner {
    day: NaiveDate,
    entries: Vec<TodayHistoryEntry>,
    backups_today: u64,
}

/// Day-scoped history of successful versions
pub struct TodayHistory {
    inner: Mutex<HistoryInner>,
    on_count_changed: Mutex<Option<Arc<dyn Fn(u64) + Send + Sync>>>,
}

impl TodayHistory {
    /// Create an empty history for the current day
    pub fn new() -> TodayHistory {
        TodayHistory {
            inner: Mutex::new(HistoryInner {
                day: Local::now().date_naive(),
                entries: Vec::new(),
                backups_today: 0,
            }),
            on_count_changed: Mutex::new(None),
        }
    }

    /// Register the observer invoked whenever the day count changes
    ///
    /// The callback runs outside the registration lock, so it may call back
    /// into the history, including re-registering itself.
    pub fn set_day_count_callback(&self, callback: DayCountCallback) {
        *self.on_count_changed.lock() = Some(Arc::from(callback));
    }

    /// Append a freshly created version if it falls within today
    ///
    /// Entries from an earlier day are ignored; a first entry of a new day
    /// resets the list and the counter. Insertion keeps the list sorted
    /// most-recent-first.
    pub fn record(&self, entry: TodayHistoryEntry) {
        let count = {
            let mut inner = self.inner.lock();
            let entry_day = entry.timestamp.date();

            if entry_day < inner.day {
                return;
            }
            if entry_day > inner.day {
                debug!("day rolled over to {}; clearing today history", entry_day);
                inner.day = entry_day;
                inner.entries.clear();
                inner.backups_today = 0;
            }

            let pos = inner
                .entries
                .partition_point(|e| e.timestamp > entry.timestamp);
            inner.entries.insert(pos, entry);
            inner.backups_today += 1;
            inner.backups_today
        };

        self.notify(count);
    }

    /// Drop the entry for one evicted or manually deleted version
    ///
    /// The day counter is monotonic within the day and is not decremented.
    pub fn remove(&self, original: &Path, timestamp: NaiveDateTime) {
        let mut inner = self.inner.lock();
        inner
            .entries
            .retain(|e| !(e.original_path == original && e.timestamp == timestamp));
    }

    /// Rebuild the view from the index for the current day
    ///
    /// The counter is reset to the number of surviving versions, which is
    /// the best reconstruction available after a restart or rescan.
    pub fn rebuild(&self, index: &VersionIndex, backup_root: &Path) {
        let today = Local::now().date_naive();
        let mut entries: Vec<TodayHistoryEntry> = index
            .records()
            .flat_map(|record| {
                record
                    .versions
                    .iter()
                    .filter(|ts| ts.date() == today)
                    .map(|ts| TodayHistoryEntry {
                        original_path: record.original_path.clone(),
                        timestamp: *ts,
                        backup_path: codec::backup_path(backup_root, &record.original_path, *ts),
                    })
            })
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let count = entries.len() as u64;
        let changed = {
            let mut inner = self.inner.lock();
            let changed = inner.backups_today != count;
            inner.day = today;
            inner.entries = entries;
            inner.backups_today = count;
            changed
        };

        if changed {
            self.notify(count);
        }
    }

    /// Snapshot of today's entries, most recent first
    pub fn entries(&self) -> Vec<TodayHistoryEntry> {
        self.inner.lock().entries.clone()
    }

    /// Number of backups taken today
    pub fn backups_today(&self) -> u64 {
        self.inner.lock().backups_today
    }

    fn notify(&self, count: u64) {
        // Clone out of the lock; the callback must be free to re-register
        let callback = self.on_count_changed.lock().clone();
        if let Some(callback) = callback {
            callback(count);
        }
    }
}

impl Default for TodayHistory {
    fn default() -> Self {
        TodayHistory::new()
    }
}

impl std::fmt::Debug for TodayHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TodayHistory")
            .field("day", &inner.day)
            .field("entries", &inner.entries.len())
            .field("backups_today", &inner.backups_today)
            .finish()
    }
}

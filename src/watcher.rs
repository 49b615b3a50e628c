//! Filesystem watchers and the per-folder processing thread
//!
//! Each watched folder gets one dedicated thread driving a
//! [`DirectoryWatcher`]: a blocking source of change-event batches. The
//! production source wraps the `notify` crate and forwards its callbacks
//! over a channel; tests substitute a scripted source, which keeps the
//! debounce-filter-pipeline chain deterministic. Stopping is cooperative: a
//! sentinel message wakes the blocked thread, which then drains out.

use crate::debounce::DebounceTracker;
use crate::error::{KeepsakeError, Result};
use crate::filter::{FileCandidate, FilterSet};
use crate::pipeline::BackupPipeline;
use crate::types::{is_path_under, ChangeAction, ChangeEvent, WatchedFolder};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Blocking source of change-event batches for one folder
///
/// `next_batch` returns `Ok(None)` once the source has stopped and will
/// produce nothing further.
pub trait DirectoryWatcher: Send {
    /// Block until the next batch of events, or `None` when stopped
    fn next_batch(&mut self) -> Result<Option<Vec<ChangeEvent>>>;
}

/// Message on the channel between the notify callback and the folder thread
enum WatcherMessage {
    Batch(Vec<ChangeEvent>),
    Stop,
}

/// Wakes and stops a [`NotifyWatcher`] blocked in `next_batch`
pub struct WatcherControl {
    tx: Sender<WatcherMessage>,
}

impl WatcherControl {
    /// Ask the watcher to stop; safe to call after it already has
    pub fn stop(&self) {
        // A closed channel means the watcher is already gone
        let _ = self.tx.send(WatcherMessage::Stop);
    }
}

/// OS-backed watcher built on the `notify` crate
pub struct NotifyWatcher {
    rx: Receiver<WatcherMessage>,
    // Held only so the OS watch stays registered
    _watcher: RecommendedWatcher,
}

impl NotifyWatcher {
    /// Register an OS watch on `dir` and return the watcher plus its control
    pub fn open(dir: &Path, recursive: bool) -> Result<(NotifyWatcher, WatcherControl)> {
        let (tx, rx) = channel();

        let event_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let Some(action) = map_event_kind(&event.kind) else {
                        return;
                    };
                    let batch: Vec<ChangeEvent> = event
                        .paths
                        .into_iter()
                        .map(|path| ChangeEvent::new(path, action))
                        .collect();
                    if !batch.is_empty() {
                        let _ = event_tx.send(WatcherMessage::Batch(batch));
                    }
                }
                Err(e) => warn!("watch backend error: {}", e),
            }
        })
        .map_err(|e| KeepsakeError::watcher(dir, e.to_string()))?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(dir, mode)
            .map_err(|e| KeepsakeError::watcher(dir, e.to_string()))?;

        info!("watching {:?} (recursive: {})", dir, recursive);
        Ok((
            NotifyWatcher {
                rx,
                _watcher: watcher,
            },
            WatcherControl { tx },
        ))
    }
}

impl DirectoryWatcher for NotifyWatcher {
    fn next_batch(&mut self) -> Result<Option<Vec<ChangeEvent>>> {
        match self.rx.recv() {
            Ok(WatcherMessage::Batch(batch)) => Ok(Some(batch)),
            // Stop sentinel or all senders dropped: either way we are done
            Ok(WatcherMessage::Stop) | Err(_) => Ok(None),
        }
    }
}

/// Which change actions warrant a new version
fn map_event_kind(kind: &EventKind) -> Option<ChangeAction> {
    match kind {
        EventKind::Create(_) => Some(ChangeAction::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeAction::RenamedTo),
        // The old name of a rename no longer points at content
        EventKind::Modify(ModifyKind::Name(_)) => None,
        EventKind::Modify(_) => Some(ChangeAction::Modified),
        _ => None,
    }
}

/// One folder's processing thread: debounce, filter, then the pipeline
pub struct FolderWatcher;

impl FolderWatcher {
    /// Spawn the thread that drains `source` for `folder`
    pub fn spawn(
        mut source: Box<dyn DirectoryWatcher>,
        folder: WatchedFolder,
        pipeline: Arc<BackupPipeline>,
    ) -> Result<JoinHandle<()>> {
        let watched_path = folder.path.clone();
        let handle = std::thread::Builder::new()
            .name(format!("watch:{}", watched_path.display()))
            .spawn(move || {
                let filters = FilterSet::parse(&folder.include_filters, &folder.exclude_filters);
                let mut debounce = DebounceTracker::new();

                loop {
                    let batch = match source.next_batch() {
                        Ok(Some(batch)) => batch,
                        Ok(None) => break,
                        Err(e) => {
                            warn!("watcher for {:?} failed: {}", folder.path, e);
                            break;
                        }
                    };

                    let backup_root = pipeline.backup_root();
                    for event in batch {
                        // Never version our own store
                        if backup_root
                            .as_deref()
                            .is_some_and(|root| is_path_under(&event.path, root))
                        {
                            continue;
                        }

                        if !folder.include_subfolders
                            && event.path.parent() != Some(folder.path.as_path())
                        {
                            trace!("outside flat watch, ignoring {:?}", event.path);
                            continue;
                        }

                        if !debounce.should_process(&event.path) {
                            trace!("debounced {:?}", event.path);
                            continue;
                        }

                        let candidate = FileCandidate::new(&event.path, &folder.path);
                        if !filters.passes(&candidate) {
                            trace!("filtered out {:?}", event.path);
                            continue;
                        }

                        pipeline.process_candidate(&event.path);
                    }

                    debounce.prune();
                }

                debug!("watcher thread for {:?} exiting", folder.path);
            })
            .map_err(|e| KeepsakeError::watcher(watched_path, e.to_string()))?;

        Ok(handle)
    }
}

/// A running folder watcher: its stop control and its thread handle
pub struct WatcherHandle {
    control: Option<WatcherControl>,
    join: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Pair a spawned thread with its stop control
    pub fn new(control: Option<WatcherControl>, join: JoinHandle<()>) -> WatcherHandle {
        WatcherHandle {
            control,
            join: Some(join),
        }
    }

    /// Stop the watcher and wait for its thread to finish
    pub fn stop(mut self) {
        if let Some(control) = self.control.take() {
            control.stop();
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("watcher thread panicked during shutdown");
            }
        }
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("running", &self.join.is_some())
            .finish()
    }
}

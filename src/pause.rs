//! Global pause switch with optional auto-resume deadline
//!
//! Pause is cooperative: the pipeline checks it once per candidate file,
//! never mid-copy. Events arriving while paused are dropped, not queued for
//! replay. An absent deadline means paused indefinitely; a set deadline is
//! cleared lazily the next time the state is read after it has passed.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct PauseState {
    paused: bool,
    resume_at: Option<Instant>,
}

/// Shared on/off switch for the backup pipeline
#[derive(Debug, Default)]
pub struct PauseController {
    state: Mutex<PauseState>,
}

impl PauseController {
    /// Create a controller in the running (not paused) state
    pub fn new() -> PauseController {
        PauseController::default()
    }

    /// Pause until explicitly resumed
    pub fn pause(&self) {
        info!("backups paused indefinitely");
        let mut state = self.state.lock();
        state.paused = true;
        state.resume_at = None;
    }

    /// Pause with an auto-resume deadline
    pub fn pause_for(&self, duration: Duration) {
        info!("backups paused for {:?}", duration);
        let mut state = self.state.lock();
        state.paused = true;
        state.resume_at = Some(Instant::now() + duration);
    }

    /// Clear the pause immediately
    pub fn resume(&self) {
        info!("backups resumed");
        let mut state = self.state.lock();
        state.paused = false;
        state.resume_at = None;
    }

    /// Current pause state; clears itself once the deadline has passed
    pub fn is_paused(&self) -> bool {
        let mut state = self.state.lock();

        if state.paused {
            if let Some(resume_at) = state.resume_at {
                if Instant::now() >= resume_at {
                    debug!("pause deadline passed; resuming");
                    state.paused = false;
                    state.resume_at = None;
                }
            }
        }

        state.paused
    }

    /// Time remaining until auto-resume, if a deadline is set
    pub fn remaining(&self) -> Option<Duration> {
        let state = self.state.lock();
        match (state.paused, state.resume_at) {
            (true, Some(resume_at)) => Some(resume_at.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }
}

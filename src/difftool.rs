//! Launching an external diff tool against two versions
//!
//! The tool is fire-and-forget: we spawn `<tool> <older> <newer>` and never
//! wait for it. Spawn failures are reported but must not disturb the
//! engine, so they surface as transient errors for the caller to display.

use crate::error::{KeepsakeError, Result};
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Spawn the configured diff tool with the older version first
pub fn launch_diff_tool(tool: Option<&Path>, older: &Path, newer: &Path) -> Result<()> {
    let Some(tool) = tool else {
        return Err(KeepsakeError::config("no diff tool configured"));
    };

    Command::new(tool)
        .arg(older)
        .arg(newer)
        .spawn()
        .map_err(|e| KeepsakeError::transient(format!("could not launch {:?}: {}", tool, e)))?;

    info!("launched {:?} on {:?} vs {:?}", tool, older, newer);
    Ok(())
}

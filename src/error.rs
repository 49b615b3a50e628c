//! Error types for the keepsake library
//!
//! This module defines all error types that can occur during backup engine
//! operations. The taxonomy follows the engine's propagation policy:
//! configuration errors refuse the operation, transient filesystem errors are
//! reported and skipped, watcher failures are terminal for one watcher only,
//! and malformed on-disk names are silently skipped during scans.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the keepsake library
pub type Result<T> = std::result::Result<T, KeepsakeError>;

/// Main error type for all keepsake operations
#[derive(Debug, Error)]
pub enum KeepsakeError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration (e.g. unset backup root)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure to open a directory change subscription; terminal for that
    /// one watcher only
    #[error("Watcher failed for {path:?}: {reason}")]
    WatcherFailed {
        /// Directory the watcher was opened for
        path: PathBuf,
        /// Human-readable failure reason
        reason: String,
    },

    /// A backup file name is missing the version marker or carries an
    /// unparsable timestamp
    #[error("Malformed version name: {0}")]
    MalformedVersionName(String),

    /// A requested `(original path, timestamp)` pair is not in the index
    #[error("Version not found: {path:?} @ {timestamp}")]
    VersionNotFound {
        /// Original path the version was looked up for
        path: PathBuf,
        /// Encoded timestamp that was requested
        timestamp: String,
    },

    /// Transient filesystem condition (copy/delete/stat failure); processing
    /// continues with the next file
    #[error("Transient error: {0}")]
    Transient(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KeepsakeError {
    /// Create a configuration error with a custom message
    pub fn config(msg: impl Into<String>) -> Self {
        KeepsakeError::Config(msg.into())
    }

    /// Create a transient error with a custom message
    pub fn transient(msg: impl Into<String>) -> Self {
        KeepsakeError::Transient(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        KeepsakeError::Internal(msg.into())
    }

    /// Create a watcher failure for a directory
    pub fn watcher(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        KeepsakeError::WatcherFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Check whether this error should abort only the current file and let
    /// processing continue
    pub fn is_transient(&self) -> bool {
        matches!(self, KeepsakeError::Transient(_) | KeepsakeError::Io(_))
    }

    /// Check whether this error refuses an operation due to configuration
    pub fn is_config(&self) -> bool {
        matches!(self, KeepsakeError::Config(_))
    }
}

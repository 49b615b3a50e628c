//! Path codec: the on-disk naming scheme of the backup store
//!
//! Backup files are stored at
//! `<backupRoot>/<sanitized-original-directory>/<stem>_backup_<YYYY_MM_DD__HH_MM_SS><ext>`
//! and that name is the only persisted metadata; there is no manifest. The
//! codec therefore has one hard requirement: encoding an
//! `(original path, timestamp)` pair and decoding it back must be the
//! identity, so that the whole index can be rebuilt from file names alone.
//!
//! The canonical path separator is `/` on every platform. [`sanitize`]
//! normalizes `\` to `/` and drops the drive-letter colon, and
//! [`unsanitize`] reinstates `X:/` for a single-letter leading component
//! (else a leading `/`). Round-trip identity holds over
//! separator-normalized absolute paths; a Unix path whose first directory is
//! a single letter is inherently ambiguous with a drive letter and
//! un-sanitizes to the drive form, an ambiguity inherited from the naming
//! scheme itself.

use crate::error::{KeepsakeError, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Marker separating the file stem from the version timestamp
pub const VERSION_MARKER: &str = "_backup_";

/// Timestamp layout inside a backup file name, one-second resolution
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d__%H_%M_%S";

/// Length of a formatted timestamp, e.g. `2024_01_02__03_04_05`
const TIMESTAMP_LEN: usize = 20;

/// A backup file name split back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVersionName {
    /// Original file stem, without extension
    pub stem: String,
    /// Original extension including the leading dot, or empty
    pub extension: String,
    /// Version timestamp recovered from the name
    pub timestamp: NaiveDateTime,
}

/// Map an absolute original directory to a backup-root-relative directory
///
/// Replaces every path separator variant with `/`, drops the drive-letter
/// colon, and strips the leading separator, yielding a string safely
/// nestable under the backup root.
///
/// # Examples
///
/// ```
/// use keepsake::codec::sanitize;
///
/// assert_eq!(sanitize("/home/user/docs"), "home/user/docs");
/// assert_eq!(sanitize(r"C:\proj\src"), "C/proj/src");
/// ```
pub fn sanitize(original_dir: &str) -> String {
    let normalized = original_dir.replace('\\', "/");
    let without_colon = normalized.replacen(':', "", 1);
    without_colon.trim_start_matches('/').to_string()
}

/// Reverse of [`sanitize`]
///
/// Reinserts the drive delimiter after a single leading letter followed by a
/// separator (or at the end of the string), otherwise restores the leading
/// `/` of a rooted path. Best-effort: inputs that are not shaped like a
/// sanitized path (already rooted, already carrying a colon, or empty) pass
/// through unchanged.
pub fn unsanitize(relative_dir: &str) -> String {
    if relative_dir.is_empty() || relative_dir.contains(':') || relative_dir.starts_with('/') {
        return relative_dir.to_string();
    }

    let normalized = relative_dir.replace('\\', "/");
    let first = normalized.split('/').next().unwrap_or("");

    if first.len() == 1 && first.chars().all(|c| c.is_ascii_alphabetic()) {
        let rest = &normalized[first.len()..];
        format!("{}:{}", first, if rest.is_empty() { "/" } else { rest })
    } else {
        format!("/{}", normalized)
    }
}

/// Encode a version file name from stem, extension, and timestamp
///
/// The extension must include its leading dot (or be empty for files
/// without one), matching what [`decode_version_name`] returns.
///
/// # Examples
///
/// ```
/// use keepsake::codec::encode_version_name;
/// use chrono::NaiveDate;
///
/// let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
///     .unwrap()
///     .and_hms_opt(3, 4, 5)
///     .unwrap();
/// assert_eq!(
///     encode_version_name("notes", ".txt", ts),
///     "notes_backup_2024_01_02__03_04_05.txt"
/// );
/// ```
pub fn encode_version_name(stem: &str, extension: &str, timestamp: NaiveDateTime) -> String {
    format!(
        "{}{}{}{}",
        stem,
        VERSION_MARKER,
        timestamp.format(TIMESTAMP_FORMAT),
        extension
    )
}

/// Decode a backup file name into stem, extension, and timestamp
///
/// Searches for the last `_backup_` marker whose trailing characters parse
/// as a timestamp, so stems that themselves contain the literal marker
/// still round-trip. Fails with [`KeepsakeError::MalformedVersionName`] if
/// no marker/timestamp combination is present; scans treat that as
/// "not a backup file" and skip it.
pub fn decode_version_name(file_name: &str) -> Result<DecodedVersionName> {
    let mut search_end = file_name.len();

    while let Some(pos) = file_name[..search_end].rfind(VERSION_MARKER) {
        let ts_start = pos + VERSION_MARKER.len();

        if let Some(ts_str) = file_name.get(ts_start..ts_start + TIMESTAMP_LEN) {
            if let Ok(timestamp) = NaiveDateTime::parse_from_str(ts_str, TIMESTAMP_FORMAT) {
                let rest = &file_name[ts_start + TIMESTAMP_LEN..];
                if rest.is_empty() || rest.starts_with('.') {
                    return Ok(DecodedVersionName {
                        stem: file_name[..pos].to_string(),
                        extension: rest.to_string(),
                        timestamp,
                    });
                }
            }
        }

        search_end = pos;
    }

    Err(KeepsakeError::MalformedVersionName(file_name.to_string()))
}

/// Compute the backup destination for an original file and timestamp
///
/// Composes `<root>/<sanitized dir>/<encoded name>`. Non-UTF-8 path
/// components are handled lossily; the store is keyed by the resulting
/// string form.
pub fn backup_path(root: &Path, original: &Path, timestamp: NaiveDateTime) -> PathBuf {
    let dir = original
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    root.join(sanitize(&dir))
        .join(encode_version_name(&stem, &extension, timestamp))
}

/// Recover `(original path, timestamp)` from a backup file location
///
/// The inverse of [`backup_path`]: takes the file's directory relative to
/// the backup root, reverses sanitization, and splits the file name. Used
/// by the rebuild scan; errors are non-fatal there.
///
/// # Errors
///
/// - [`KeepsakeError::Internal`] if the file does not lie under the root
/// - [`KeepsakeError::MalformedVersionName`] if the name does not decode
pub fn original_path(root: &Path, backup_file: &Path) -> Result<(PathBuf, NaiveDateTime)> {
    let relative = backup_file.strip_prefix(root).map_err(|_| {
        KeepsakeError::internal(format!(
            "backup file {:?} is not under root {:?}",
            backup_file, root
        ))
    })?;

    let file_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let decoded = decode_version_name(&file_name)?;

    let rel_dir = relative
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let dir = unsanitize(&rel_dir);

    let original = if dir.ends_with('/') {
        format!("{}{}{}", dir, decoded.stem, decoded.extension)
    } else {
        format!("{}/{}{}", dir, decoded.stem, decoded.extension)
    };

    Ok((PathBuf::from(original), decoded.timestamp))
}

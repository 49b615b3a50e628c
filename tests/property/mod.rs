//! Property-based testing for the version-name codec
//!
//! Uses proptest to verify that version names and store locations
//! round-trip for arbitrary stems, extensions, timestamps, and paths.

use ::keepsake::codec;
use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

/// Timestamps at the codec's one-second resolution
fn timestamp_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (2000i32..2100, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(y, mo, d, h, mi, s)| {
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap()
        },
    )
}

/// File stems, including ones that contain the version marker themselves
fn stem_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z][a-zA-Z0-9 _-]{0,20}",
        "[a-z]{1,5}_backup_[a-z]{1,5}",
    ]
}

/// Extensions with the leading dot, or none at all
fn extension_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "\\.[a-z0-9]{1,6}"]
}

/// Absolute original paths in canonical separator form
///
/// Directory names are at least two characters long; a single-letter first
/// directory is indistinguishable from a sanitized drive letter and cannot
/// round-trip.
fn original_path_strategy() -> impl Strategy<Value = PathBuf> {
    (
        prop::collection::vec("[a-z]{2}[a-z0-9 _-]{0,9}", 0..4),
        "[a-z][a-z0-9_-]{0,10}",
        extension_strategy(),
    )
        .prop_map(|(dirs, stem, ext)| {
            let mut path = String::from("/");
            for dir in dirs {
                path.push_str(&dir);
                path.push('/');
            }
            path.push_str(&stem);
            path.push_str(&ext);
            PathBuf::from(path)
        })
}

proptest! {
    #[test]
    fn prop_version_name_round_trips(
        stem in stem_strategy(),
        ext in extension_strategy(),
        ts in timestamp_strategy(),
    ) {
        let name = codec::encode_version_name(&stem, &ext, ts);
        let decoded = codec::decode_version_name(&name).unwrap();
        prop_assert_eq!(decoded.stem, stem);
        prop_assert_eq!(decoded.extension, ext);
        prop_assert_eq!(decoded.timestamp, ts);
    }

    #[test]
    fn prop_store_location_round_trips(
        original in original_path_strategy(),
        ts in timestamp_strategy(),
    ) {
        let root = Path::new("/backups");
        let backup = codec::backup_path(root, &original, ts);
        let (recovered, recovered_ts) = codec::original_path(root, &backup).unwrap();
        prop_assert_eq!(recovered, original);
        prop_assert_eq!(recovered_ts, ts);
    }

    #[test]
    fn prop_sanitize_round_trips_unix_paths(
        original in original_path_strategy(),
    ) {
        let raw = original.to_string_lossy().into_owned();
        let relative = codec::sanitize(&raw);
        prop_assert!(!relative.starts_with('/'));
        // Single-letter first segments are reserved for drive letters
        prop_assume!(relative.split('/').next().map_or(true, |seg| seg.len() != 1));
        prop_assert_eq!(codec::unsanitize(&relative), raw);
    }

    #[test]
    fn prop_windows_drive_round_trips(
        rest in prop::collection::vec("[a-z][a-z0-9]{0,8}", 1..4),
        ts in timestamp_strategy(),
    ) {
        let raw = format!("C:\\{}", rest.join("\\"));
        let relative = codec::sanitize(&raw);
        prop_assert!(relative.starts_with("C/"));
        prop_assert_eq!(codec::unsanitize(&relative), raw.replace('\\', "/"));
        // A full store round-trip agrees too
        let root = Path::new("/backups");
        let original = PathBuf::from(raw.replace('\\', "/"));
        let backup = codec::backup_path(root, &original, ts);
        let (recovered, _) = codec::original_path(root, &backup).unwrap();
        prop_assert_eq!(recovered, original);
    }

    #[test]
    fn prop_garbage_names_never_decode(
        name in "[a-z]{1,12}(\\.[a-z]{1,4})?",
    ) {
        // No marker at all: must be rejected, never panic
        prop_assert!(codec::decode_version_name(&name).is_err());
    }
}

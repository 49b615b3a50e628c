//! Filter engine: decides whether a changed file qualifies for backup
//!
//! Each watched folder carries two free-form token lists (include and
//! exclude), delimited by commas, semicolons, or whitespace. A token is
//! interpreted by shape, in precedence order:
//!
//! 1. contains a path separator → path-shaped: glob against the relative
//!    path when it has wildcards (a leading separator additionally tries a
//!    match-anywhere form), substring of the relative path otherwise
//! 2. a literal extension (`.txt`) → exact extension match
//! 3. has wildcards → glob against the file name only
//! 4. starts with `.` → exact extension match
//! 5. otherwise → the extension without its dot, else substring of the full
//!    path
//!
//! A candidate passes iff no exclude token matches (exclude always wins)
//! and the include list is empty or at least one include token matches.
//! Matching is case-insensitive throughout; blank tokens are ignored.

use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;
use tracing::debug;

/// Split a raw filter or query string into trimmed, non-empty tokens
///
/// Delimiters are commas, semicolons, and any whitespace.
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keyword query predicate for the UI's search box
///
/// True iff every token of `keywords` is a case-insensitive substring of
/// `phrase`. An empty or all-blank query matches everything.
pub fn contains_all_keywords(phrase: &str, keywords: &str) -> bool {
    let phrase_lower = phrase.to_lowercase();
    split_tokens(keywords)
        .iter()
        .all(|token| phrase_lower.contains(&token.to_lowercase()))
}

fn has_wildcards(token: &str) -> bool {
    token.contains('*') || token.contains('?')
}

fn compile_glob(pattern: &str) -> Option<GlobMatcher> {
    match GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
    {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            debug!("filter token {:?} is not a valid glob: {}", pattern, e);
            None
        }
    }
}

/// One parsed filter token, classified by the precedence rules above
enum CompiledToken {
    /// Path-shaped glob against the relative path; `anywhere` is the
    /// match-anywhere variant tried for tokens with a leading separator
    PathGlob {
        direct: GlobMatcher,
        anywhere: Option<GlobMatcher>,
    },
    /// Path-shaped token without wildcards: substring of the relative path
    PathSubstring(String),
    /// Exact extension match, stored with the leading dot
    Extension(String),
    /// Wildcard match against the file name only
    NameGlob(GlobMatcher),
    /// Extension without its dot, else substring of the full path
    Bare(String),
}

impl CompiledToken {
    fn compile(raw: &str) -> Option<CompiledToken> {
        let token = raw.to_lowercase().replace('\\', "/");
        if token.is_empty() {
            return None;
        }

        if token.contains('/') {
            if has_wildcards(&token) {
                let direct = compile_glob(&token)?;
                let anywhere = if token.starts_with('/') {
                    compile_glob(&format!("*{}", token))
                } else {
                    None
                };
                return Some(CompiledToken::PathGlob { direct, anywhere });
            }
            return Some(CompiledToken::PathSubstring(token));
        }

        if token.starts_with('.') && token.len() > 1 && !has_wildcards(&token) {
            return Some(CompiledToken::Extension(token));
        }

        if has_wildcards(&token) {
            return Some(CompiledToken::NameGlob(compile_glob(&token)?));
        }

        if token.starts_with('.') {
            return Some(CompiledToken::Extension(token));
        }

        Some(CompiledToken::Bare(token))
    }

    fn matches(&self, candidate: &FileCandidate) -> bool {
        match self {
            CompiledToken::PathGlob { direct, anywhere } => {
                direct.is_match(&candidate.relative_path)
                    || anywhere
                        .as_ref()
                        .is_some_and(|g| g.is_match(&candidate.relative_path))
            }
            CompiledToken::PathSubstring(needle) => candidate.relative_path.contains(needle),
            CompiledToken::Extension(ext) => candidate.extension == *ext,
            CompiledToken::NameGlob(glob) => glob.is_match(&candidate.file_name),
            CompiledToken::Bare(token) => {
                candidate.extension.strip_prefix('.') == Some(token.as_str())
                    || candidate.full_path.contains(token)
            }
        }
    }
}

/// Lowercased views of one candidate path, precomputed once per event
#[derive(Debug, Clone)]
pub struct FileCandidate {
    /// File name only, e.g. `notes.txt`
    pub file_name: String,
    /// Extension with leading dot, e.g. `.txt`, or empty
    pub extension: String,
    /// Path relative to the watch root with a leading separator,
    /// e.g. `/sub/notes.txt`
    pub relative_path: String,
    /// Full path with normalized separators
    pub full_path: String,
}

impl FileCandidate {
    /// Build the lowercase views for a path under a watch root
    pub fn new(full_path: &Path, watch_root: &Path) -> FileCandidate {
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let extension = full_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        let relative = full_path
            .strip_prefix(watch_root)
            .unwrap_or(full_path)
            .to_string_lossy()
            .replace('\\', "/")
            .to_lowercase();
        let relative_path = format!("/{}", relative.trim_start_matches('/'));

        let full = full_path
            .to_string_lossy()
            .replace('\\', "/")
            .to_lowercase();

        FileCandidate {
            file_name,
            extension,
            relative_path,
            full_path: full,
        }
    }
}

/// Compiled include/exclude token lists for one watched folder
pub struct FilterSet {
    includes: Vec<CompiledToken>,
    excludes: Vec<CompiledToken>,
}

impl FilterSet {
    /// Parse the raw include/exclude strings of a watched folder
    pub fn parse(include_raw: &str, exclude_raw: &str) -> FilterSet {
        let compile = |raw: &str| {
            split_tokens(raw)
                .iter()
                .filter_map(|t| CompiledToken::compile(t))
                .collect::<Vec<_>>()
        };

        FilterSet {
            includes: compile(include_raw),
            excludes: compile(exclude_raw),
        }
    }

    /// Decide whether a candidate qualifies for backup
    ///
    /// Exclude always wins; an empty include list includes everything.
    pub fn passes(&self, candidate: &FileCandidate) -> bool {
        if self.excludes.iter().any(|t| t.matches(candidate)) {
            return false;
        }

        self.includes.is_empty() || self.includes.iter().any(|t| t.matches(candidate))
    }
}

impl std::fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterSet")
            .field("includes", &self.includes.len())
            .field("excludes", &self.excludes.len())
            .finish()
    }
}

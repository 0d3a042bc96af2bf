//! Path guard: every copy and edit resolves its targets through this module before touching
//! the filesystem, so nothing is read or written outside the caller-designated root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::DEFAULT_EXCLUDE_PATTERNS;
use crate::error::{DooiError, ErrorCode, Result};

/// Traversal sequences and their percent-encoded spellings, matched case-insensitively.
const TRAVERSAL_SEQUENCES: &[&str] = &[
    "../",
    "..\\",
    "..%2f",
    "..%5c",
    "%2e%2e%2f",
    "%2e%2e%5c",
    "..%252f",
    "..%255c",
];

/// Patterns that would select an entire tree.
const UNBOUNDED_PATTERNS: &[&str] = &["**", "**/*", "**/**"];

const MAX_FILENAME_LENGTH: usize = 255;

/// Textual pre-filter; `false` when the candidate contains a traversal sequence.
pub fn is_safe_path(candidate: &str) -> bool {
    let lowered = candidate.to_lowercase();
    !TRAVERSAL_SEQUENCES
        .iter()
        .any(|sequence| lowered.contains(sequence))
}

/// Resolves `candidate` against `base` lexically and fails with `PathTraversal` when the
/// result is neither `base` nor a descendant of it.
pub fn resolve_within(base: &Path, candidate: impl AsRef<Path>) -> Result<PathBuf> {
    let candidate = candidate.as_ref();
    let base = absolute_normalized(base)?;
    let resolved = normalize_path(&base.join(candidate));

    if resolved != base && !resolved.starts_with(&base) {
        tracing::warn!(
            base = %base.display(),
            target = %resolved.display(),
            "path escapes its root"
        );
        return Err(DooiError::with_message(
            ErrorCode::PathTraversal,
            format!(
                "Path traversal attempt: {} escapes from {}",
                candidate.display(),
                base.display()
            ),
        )
        .detail("basePath", base.display().to_string())
        .detail("targetPath", candidate.display().to_string()));
    }

    Ok(resolved)
}

/// [`is_safe_path`] followed by [`resolve_within`].
pub fn validate_path_within(base: &Path, candidate: &str) -> Result<PathBuf> {
    if !is_safe_path(candidate) {
        return Err(DooiError::with_message(
            ErrorCode::PathTraversal,
            format!("Unsafe path detected: {candidate}"),
        )
        .detail("targetPath", candidate));
    }
    resolve_within(base, candidate)
}

/// Creates `path` (and parents) if needed, then proves it is writable by creating and removing a
/// scratch file inside it.
pub fn ensure_writable_directory(path: &Path) -> Result<()> {
    let not_writable = |reason: String| {
        DooiError::with_message(
            ErrorCode::DestNotWritable,
            format!("Cannot create or write to directory: {}", path.display()),
        )
        .detail("path", path.display().to_string())
        .detail("reason", reason)
    };

    fs::create_dir_all(path).map_err(|err| not_writable(err.to_string()))?;
    tempfile::NamedTempFile::new_in(path).map_err(|err| not_writable(err.to_string()))?;
    tracing::debug!(path = %path.display(), "directory is writable");
    Ok(())
}

/// Rejects glob patterns that reach outside the root or select everything.
///
/// Known-safe exclude patterns skip the checks entirely.
pub fn validate_glob_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<()> {
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if DEFAULT_EXCLUDE_PATTERNS.contains(&pattern) {
            continue;
        }

        if is_rooted_pattern(pattern) || has_traversal_segment(pattern) {
            return Err(DooiError::with_message(
                ErrorCode::PathTraversal,
                format!("Dangerous glob pattern detected: {pattern}"),
            )
            .detail("pattern", pattern));
        }

        if UNBOUNDED_PATTERNS.contains(&pattern) {
            return Err(DooiError::invalid_input(format!(
                "Glob pattern too broad: {pattern}"
            ))
            .detail("pattern", pattern));
        }
    }
    Ok(())
}

/// Replaces characters that are unsafe in a single path segment.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            ch if ch.is_whitespace() => '_',
            ch => ch,
        })
        .collect();
    replaced
        .trim_start_matches('.')
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .collect()
}

/// Lexically resolves `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn absolute_normalized(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    Ok(normalize_path(&absolute))
}

fn is_rooted_pattern(pattern: &str) -> bool {
    let bytes = pattern.as_bytes();
    let drive_root = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\');
    pattern.starts_with('/') || pattern.starts_with('\\') || drive_root
}

fn has_traversal_segment(pattern: &str) -> bool {
    pattern
        .split(['/', '\\'])
        .any(|segment| segment == ".." || segment == "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_sequences_are_unsafe() {
        for candidate in [
            "../etc/passwd",
            "a/..\\b",
            "..%2Fsecret",
            "%2E%2E%2Fsecret",
            "..%252fdouble",
        ] {
            assert!(!is_safe_path(candidate), "{candidate} should be unsafe");
        }
        assert!(is_safe_path("components/ui/button.tsx"));
    }

    #[test]
    fn resolve_within_rejects_escape() {
        let err = resolve_within(Path::new("/proj"), "../../etc/passwd").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathTraversal);
    }

    #[test]
    fn resolve_within_rejects_sibling_with_shared_prefix() {
        let err = resolve_within(Path::new("/proj"), "/project-other/file").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PathTraversal);
    }

    #[test]
    fn resolve_within_accepts_base_and_descendants() {
        assert_eq!(
            resolve_within(Path::new("/proj"), ".").unwrap(),
            PathBuf::from("/proj")
        );
        assert_eq!(
            resolve_within(Path::new("/proj"), "src/./lib/../ui/a.tsx").unwrap(),
            PathBuf::from("/proj/src/ui/a.tsx")
        );
    }

    #[test]
    fn glob_validation_flags_roots_and_unbounded_patterns() {
        assert_eq!(
            validate_glob_patterns(&["**/../**"]).unwrap_err().code(),
            ErrorCode::PathTraversal
        );
        assert_eq!(
            validate_glob_patterns(&["/**"]).unwrap_err().code(),
            ErrorCode::PathTraversal
        );
        assert_eq!(
            validate_glob_patterns(&["C:/**"]).unwrap_err().code(),
            ErrorCode::PathTraversal
        );
        assert_eq!(
            validate_glob_patterns(&["**/*"]).unwrap_err().code(),
            ErrorCode::InvalidInput
        );
        assert!(validate_glob_patterns(&["node_modules/**", "src/**", "**/*.tsx"]).is_ok());
    }

    #[test]
    fn writable_directory_is_created() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a/b/c");
        ensure_writable_directory(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[test]
    fn sanitize_filename_strips_separators_and_leading_dots() {
        assert_eq!(sanitize_filename("..hidden/name?.tsx"), "hidden_name_.tsx");
        assert_eq!(sanitize_filename("fluid blob"), "fluid_blob");
    }
}

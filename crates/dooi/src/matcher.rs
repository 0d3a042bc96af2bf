use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use schemars::JsonSchema;
use serde::Serialize;

use crate::error::{DooiError, ErrorCode, Result};
use crate::guard::validate_glob_patterns;

/// One filesystem entry selected by an include/exclude specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Root-relative path with `/` separators.
    pub relative_path: String,
    pub full_path: PathBuf,
    pub size: u64,
    pub is_directory: bool,
}

/// Compiled include/exclude globs.
///
/// `*` never crosses a `/`, so `*.log` only matches at the root while `**/*.log` matches at any
/// depth. Dot-files are matched like any other file.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    include: GlobSet,
    exclude: GlobSet,
    /// Directory prefixes of `dir/**` excludes; matching directories are not descended into.
    prune: GlobSet,
}

impl FileMatcher {
    pub fn new<I: AsRef<str>, E: AsRef<str>>(include: &[I], exclude: &[E]) -> Result<Self> {
        let prune_prefixes: Vec<&str> = exclude
            .iter()
            .filter_map(|pattern| pattern.as_ref().strip_suffix("/**"))
            .filter(|prefix| !prefix.is_empty())
            .collect();

        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
            prune: build_set(&prune_prefixes)?,
        })
    }

    pub fn is_match(&self, relative: &str) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }

    /// Walks `root` and returns every matching file and directory, sorted by path.
    pub fn walk(&self, root: &Path) -> Result<Vec<FileInfo>> {
        if !root.is_dir() {
            return Err(DooiError::with_message(
                ErrorCode::InternalError,
                format!("Failed to scan files: {} is not a directory", root.display()),
            )
            .detail("root", root.display().to_string()));
        }

        let prune = self.prune.clone();
        let exclude = self.exclude.clone();
        let prune_root = root.to_path_buf();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                let Some(relative) = relative_path(&prune_root, entry.path()) else {
                    return true;
                };
                !(prune.is_match(&relative) || exclude.is_match(&relative))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let Some(relative) = relative_path(root, entry.path()) else {
                continue;
            };
            if !self.is_match(&relative) {
                continue;
            }

            let metadata = entry.metadata().ok();
            files.push(FileInfo {
                relative_path: relative,
                full_path: entry.path().to_path_buf(),
                size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
                is_directory: metadata.as_ref().is_some_and(|m| m.is_dir()),
            });
        }

        Ok(files)
    }
}

/// Validates the patterns, then lists matches under `root`.
pub fn match_files<I: AsRef<str>, E: AsRef<str>>(
    root: &Path,
    include: &[I],
    exclude: &[E],
) -> Result<Vec<FileInfo>> {
    validate_glob_patterns(include)?;
    validate_glob_patterns(exclude)?;

    let files = FileMatcher::new(include, exclude)?.walk(root)?;
    tracing::debug!(root = %root.display(), count = files.len(), "matched files");
    Ok(files)
}

/// Fails with `NoMatches` when `files` is empty.
pub fn require_matches<I: AsRef<str>, E: AsRef<str>>(
    files: Vec<FileInfo>,
    include: &[I],
    exclude: &[E],
) -> Result<Vec<FileInfo>> {
    if files.is_empty() {
        return Err(DooiError::with_message(
            ErrorCode::NoMatches,
            "No files match the specified include/exclude patterns",
        )
        .detail("include", join_patterns(include))
        .detail("exclude", join_patterns(exclude)));
    }
    Ok(files)
}

fn build_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|err| {
                DooiError::invalid_input(format!("Invalid glob pattern '{pattern}': {err}"))
                    .detail("pattern", pattern)
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| DooiError::invalid_input(format!("Invalid glob patterns: {err}")))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    Some(relative.to_string_lossy().replace('\\', "/"))
}

fn join_patterns<S: AsRef<str>>(patterns: &[S]) -> String {
    patterns
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::{default_exclude, default_include};

    fn write(root: &Path, relative: &str, body: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn include_then_exclude() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "components/ui/button.tsx", "export {}");
        write(temp.path(), "node_modules/react/index.js", "");
        write(temp.path(), "debug.log", "");
        write(temp.path(), ".dooi/meta.json", "{}");
        write(temp.path(), "README.md", "# hi");

        let files = match_files(temp.path(), &default_include(), &default_exclude()).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "components/ui/button.tsx"]);
        assert!(files.iter().all(|f| !f.is_directory));
        assert_eq!(files[1].size, 9);
    }

    #[test]
    fn directories_are_returned_when_included() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "lib/utils.ts", "");

        let files = match_files(temp.path(), &["lib", "lib/*.ts"], &[] as &[&str]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].is_directory);
        assert_eq!(files[1].relative_path, "lib/utils.ts");
    }

    #[test]
    fn star_does_not_cross_separators() {
        let matcher = FileMatcher::new(&["*.log"], &[] as &[&str]).unwrap();
        assert!(matcher.is_match("debug.log"));
        assert!(!matcher.is_match("logs/debug.log"));
    }

    #[test]
    fn empty_result_fails_no_matches() {
        let temp = tempfile::tempdir().unwrap();
        let files = match_files(temp.path(), &["**/*.tsx"], &[] as &[&str]).unwrap();
        let err = require_matches(files, &["**/*.tsx"], &[] as &[&str]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoMatches);
    }
}

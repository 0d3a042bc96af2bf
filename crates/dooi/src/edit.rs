//! Pattern-based text edits across a project tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_PREVIEW_CONTEXT_LINES, MAX_FILE_SIZE_MB, MAX_FILES_PER_OPERATION, MAX_PATTERN_LENGTH,
    TEXT_FILE_EXTENSIONS,
};
use crate::error::{DooiError, ErrorCode, Result};
use crate::guard::resolve_within;
use crate::matcher::{FileInfo, match_files, require_matches};

/// Regexes rejected outright because they select whole lines or files.
const BROAD_PATTERNS: &[&str] = &[".*", "^.*$", ".+"];

/// One find/replace rule. When both `find` and `findRegex` are set, `find` is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextReplacement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub find: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub find_regex: Option<String>,
    pub replace_with: String,
}

impl TextReplacement {
    pub fn literal(find: impl Into<String>, replace_with: impl Into<String>) -> Self {
        Self {
            find: Some(find.into()),
            find_regex: None,
            replace_with: replace_with.into(),
        }
    }

    pub fn regex(pattern: impl Into<String>, replace_with: impl Into<String>) -> Self {
        Self {
            find: None,
            find_regex: Some(pattern.into()),
            replace_with: replace_with.into(),
        }
    }
}

fn default_dry_run() -> bool {
    true
}

fn default_preview_lines() -> usize {
    DEFAULT_PREVIEW_CONTEXT_LINES
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditOptions {
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// Upper bound on files actually modified; exceeding it fails the whole plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_changed_files: Option<usize>,
    #[serde(default = "default_preview_lines")]
    pub preview_context_lines: usize,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            dry_run: default_dry_run(),
            limit_changed_files: None,
            preview_context_lines: default_preview_lines(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditPlan {
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub replacements: Vec<TextReplacement>,
    #[serde(default)]
    pub options: EditOptions,
}

impl EditPlan {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() || self.replacements.is_empty()
    }
}

/// One replaced occurrence. Positions are 1-based and refer to the content as it was when the
/// producing replacement ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditChange {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub old_text: String,
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PreviewContext {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct EditPreview {
    pub file: String,
    pub line: usize,
    pub changes: Vec<EditChange>,
    pub context: PreviewContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    pub changed_files: Vec<String>,
    pub changes: Vec<EditChange>,
    pub skipped: Vec<SkippedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previews: Option<Vec<EditPreview>>,
}

/// A validated, compiled [`TextReplacement`].
#[derive(Debug, Clone)]
pub struct CompiledReplacement {
    regex: Regex,
    replace_with: String,
    expand: bool,
}

pub fn compile_replacements(replacements: &[TextReplacement]) -> Result<Vec<CompiledReplacement>> {
    replacements.iter().map(compile_replacement).collect()
}

fn compile_replacement(replacement: &TextReplacement) -> Result<CompiledReplacement> {
    let (pattern, expand) = match (&replacement.find, &replacement.find_regex) {
        (Some(find), _) => (find.as_str(), false),
        (None, Some(pattern)) => (pattern.as_str(), true),
        (None, None) => {
            return Err(DooiError::with_message(
                ErrorCode::InvalidReplacement,
                "Replacement must set find or findRegex",
            ));
        }
    };

    let too_long = [&replacement.find, &replacement.find_regex]
        .into_iter()
        .flatten()
        .map(|value| value.chars().count())
        .find(|&len| len > MAX_PATTERN_LENGTH);
    if let Some(length) = too_long {
        return Err(DooiError::with_message(
            ErrorCode::InvalidReplacement,
            "Replacement pattern too long for safety",
        )
        .detail("length", length));
    }

    if !expand {
        if pattern.is_empty() {
            return Err(DooiError::with_message(
                ErrorCode::InvalidReplacement,
                "Literal find text must not be empty",
            ));
        }
        let regex = Regex::new(&regex::escape(pattern)).map_err(|err| invalid_regex(pattern, err))?;
        return Ok(CompiledReplacement {
            regex,
            replace_with: replacement.replace_with.clone(),
            expand,
        });
    }

    if BROAD_PATTERNS.contains(&pattern.trim()) {
        return Err(DooiError::with_message(
            ErrorCode::InvalidRegex,
            format!("Invalid regex pattern: {pattern}"),
        )
        .detail("pattern", pattern));
    }
    let regex = Regex::new(pattern).map_err(|err| invalid_regex(pattern, err))?;
    if regex.is_match("") {
        return Err(DooiError::with_message(
            ErrorCode::InvalidRegex,
            format!("Invalid regex pattern: {pattern} matches the empty string"),
        )
        .detail("pattern", pattern));
    }

    Ok(CompiledReplacement {
        regex,
        replace_with: replacement.replace_with.clone(),
        expand,
    })
}

fn invalid_regex(pattern: &str, err: regex::Error) -> DooiError {
    DooiError::with_message(ErrorCode::InvalidRegex, format!("Invalid regex pattern: {pattern}"))
        .detail("pattern", pattern)
        .detail("reason", err.to_string())
}

/// Content after every replacement, plus one change per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedContent {
    pub content: String,
    pub changes: Vec<EditChange>,
}

/// Applies `replacements` in order; each one sees the output of the previous.
pub fn edit_content(
    file: &str,
    original: &str,
    replacements: &[CompiledReplacement],
) -> EditedContent {
    let mut content = original.to_string();
    let mut changes = Vec::new();

    for replacement in replacements {
        let mut output = String::with_capacity(content.len());
        let mut last = 0;
        for caps in replacement.regex.captures_iter(&content) {
            let Some(found) = caps.get(0) else {
                continue;
            };
            if found.as_str().is_empty() {
                continue;
            }

            let mut new_text = String::new();
            if replacement.expand {
                caps.expand(&replacement.replace_with, &mut new_text);
            } else {
                new_text.push_str(&replacement.replace_with);
            }

            let (line, column) = position_of(&content, found.start());
            changes.push(EditChange {
                file: file.to_string(),
                line,
                column,
                old_text: found.as_str().to_string(),
                new_text: new_text.clone(),
            });

            output.push_str(&content[last..found.start()]);
            output.push_str(&new_text);
            last = found.end();
        }
        output.push_str(&content[last..]);
        content = output;
    }

    EditedContent { content, changes }
}

fn position_of(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

/// Groups `changes` by line and attaches `context_lines` of surrounding text.
pub fn build_previews(
    file: &str,
    original: &str,
    modified: &str,
    changes: &[EditChange],
    context_lines: usize,
) -> Vec<EditPreview> {
    let mut by_line: BTreeMap<usize, Vec<EditChange>> = BTreeMap::new();
    for change in changes {
        by_line.entry(change.line).or_default().push(change.clone());
    }

    let original_lines: Vec<&str> = original.split('\n').collect();
    let modified_lines: Vec<&str> = modified.split('\n').collect();
    let window = |lines: &[&str], line: usize| -> Vec<String> {
        let start = line.saturating_sub(context_lines + 1).min(lines.len());
        let end = (line + context_lines).min(lines.len());
        lines[start..end].iter().map(|l| l.to_string()).collect()
    };

    by_line
        .into_iter()
        .map(|(line, changes)| EditPreview {
            file: file.to_string(),
            line,
            changes,
            context: PreviewContext {
                before: window(&original_lines, line),
                after: window(&modified_lines, line),
            },
        })
        .collect()
}

/// Text files under `dest_root` selected by the plan's patterns.
///
/// Fails `NoMatches` when nothing matches and `TooManyChanges` when the match count is above
/// [`MAX_FILES_PER_OPERATION`]. Directories and files without a known text extension
/// (binaries, lock files, `LICENSE`) are dropped.
pub fn find_files_to_edit(dest_root: &Path, plan: &EditPlan) -> Result<Vec<FileInfo>> {
    let files = require_matches(
        match_files(dest_root, &plan.include, &plan.exclude)?,
        &plan.include,
        &plan.exclude,
    )?;

    if files.len() > MAX_FILES_PER_OPERATION {
        return Err(DooiError::with_message(
            ErrorCode::TooManyChanges,
            format!(
                "Too many files match: {} > {MAX_FILES_PER_OPERATION}",
                files.len()
            ),
        )
        .detail("fileCount", files.len())
        .detail("limit", MAX_FILES_PER_OPERATION));
    }

    let mut selected = Vec::with_capacity(files.len());
    for file in files {
        if file.is_directory || !is_text_file(&file.relative_path) {
            continue;
        }
        resolve_within(dest_root, &file.relative_path)?;
        selected.push(file);
    }
    Ok(selected)
}

fn is_text_file(relative: &str) -> bool {
    Path::new(relative)
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| TEXT_FILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

struct PendingEdit {
    file: FileInfo,
    original: String,
    edited: EditedContent,
}

/// Runs `plan` against `dest_root`.
///
/// All edits are computed before anything is written, so a plan that trips
/// `limitChangedFiles` leaves the tree untouched.
pub fn apply_edit_plan(dest_root: &Path, plan: &EditPlan) -> Result<EditResult> {
    let compiled = compile_replacements(&plan.replacements)?;
    let files = find_files_to_edit(dest_root, plan)?;
    let options = &plan.options;
    let max_bytes = MAX_FILE_SIZE_MB * 1024 * 1024;

    let mut result = EditResult::default();
    let mut pending = Vec::new();

    for file in files {
        if file.size > max_bytes {
            result.skipped.push(SkippedFile {
                file: file.relative_path.clone(),
                reason: format!("File larger than {MAX_FILE_SIZE_MB} MB"),
            });
            continue;
        }
        let original = match fs::read_to_string(&file.full_path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(file = %file.relative_path, error = %err, "skipping file");
                result.skipped.push(SkippedFile {
                    file: file.relative_path.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let edited = edit_content(&file.relative_path, &original, &compiled);
        if edited.changes.is_empty() {
            continue;
        }
        pending.push(PendingEdit {
            file,
            original,
            edited,
        });
    }

    if let Some(limit) = options.limit_changed_files.filter(|limit| pending.len() > *limit) {
        return Err(DooiError::with_message(
            ErrorCode::TooManyChanges,
            format!("Too many files would be changed: {} > {limit}", pending.len()),
        )
        .detail("fileCount", pending.len())
        .detail("limit", limit));
    }

    let mut previews = Vec::new();
    for edit in pending {
        if !options.dry_run {
            if let Err(err) = fs::write(&edit.file.full_path, &edit.edited.content) {
                tracing::warn!(file = %edit.file.relative_path, error = %err, "write failed");
                result.skipped.push(SkippedFile {
                    file: edit.file.relative_path,
                    reason: err.to_string(),
                });
                continue;
            }
        } else if options.preview_context_lines > 0 {
            previews.extend(build_previews(
                &edit.file.relative_path,
                &edit.original,
                &edit.edited.content,
                &edit.edited.changes,
                options.preview_context_lines,
            ));
        }
        result.changed_files.push(edit.file.relative_path);
        result.changes.extend(edit.edited.changes);
    }

    if options.dry_run {
        result.previews = Some(previews);
    }

    tracing::info!(
        root = %dest_root.display(),
        changed = result.changed_files.len(),
        changes = result.changes.len(),
        skipped = result.skipped.len(),
        dry_run = options.dry_run,
        "text edit finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(replacements: &[TextReplacement]) -> Vec<CompiledReplacement> {
        compile_replacements(replacements).unwrap()
    }

    fn plan(include: &[&str], replacements: Vec<TextReplacement>, dry_run: bool) -> EditPlan {
        EditPlan {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            replacements,
            options: EditOptions {
                dry_run,
                ..EditOptions::default()
            },
        }
    }

    #[test]
    fn literal_replacement_records_every_occurrence() {
        let edited = edit_content(
            "a.txt",
            "foo foo foo",
            &compiled(&[TextReplacement::literal("foo", "bar")]),
        );
        assert_eq!(edited.content, "bar bar bar");
        assert_eq!(edited.changes.len(), 3);
        assert_eq!(edited.changes[2].column, 9);
    }

    #[test]
    fn positions_are_one_based_per_line() {
        let edited = edit_content(
            "a.txt",
            "one\ntwo Dooi\nDooi",
            &compiled(&[TextReplacement::literal("Dooi", "Acme")]),
        );
        let positions: Vec<_> = edited.changes.iter().map(|c| (c.line, c.column)).collect();
        assert_eq!(positions, vec![(2, 5), (3, 1)]);
    }

    #[test]
    fn sequential_replacements_see_prior_output() {
        let edited = edit_content(
            "a.txt",
            "alpha",
            &compiled(&[
                TextReplacement::literal("alpha", "beta"),
                TextReplacement::literal("beta", "gamma"),
            ]),
        );
        assert_eq!(edited.content, "gamma");
        assert_eq!(edited.changes.len(), 2);
        assert_eq!(edited.changes[1].old_text, "beta");
    }

    #[test]
    fn literal_text_is_not_expanded_but_regex_captures_are() {
        let edited = edit_content(
            "a.txt",
            "a1 b2",
            &compiled(&[
                TextReplacement::literal("a1", "$1"),
                TextReplacement::regex(r"b(\d)", "c$1"),
            ]),
        );
        assert_eq!(edited.content, "$1 c2");
        assert_eq!(edited.changes[1].new_text, "c2");
    }

    #[test]
    fn find_takes_precedence_over_find_regex() {
        let replacement = TextReplacement {
            find: Some("a.c".into()),
            find_regex: Some("a.c".into()),
            replace_with: "x".into(),
        };
        let edited = edit_content("f", "abc a.c", &compiled(&[replacement]));
        assert_eq!(edited.content, "abc x");
    }

    #[test]
    fn unsafe_patterns_are_rejected() {
        for pattern in [".*", ".+", "^.*$", "x*", "("] {
            let err = compile_replacements(&[TextReplacement::regex(pattern, "y")]).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidRegex, "{pattern}");
        }
        let long = "a".repeat(MAX_PATTERN_LENGTH + 1);
        let err = compile_replacements(&[TextReplacement::literal(long, "y")]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidReplacement);
    }

    #[test]
    fn overlong_regex_is_rejected_even_when_find_wins() {
        let replacement = TextReplacement {
            find: Some("Dooi".into()),
            find_regex: Some("b".repeat(MAX_PATTERN_LENGTH + 1)),
            replace_with: "Acme".into(),
        };
        let err = compile_replacements(&[replacement]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidReplacement);
        assert_eq!(err.details["length"], MAX_PATTERN_LENGTH + 1);
    }

    #[test]
    fn previews_carry_context_from_both_versions() {
        let original = "l1\nl2\nDooi\nl4\nl5";
        let replacements = compiled(&[TextReplacement::literal("Dooi", "Acme")]);
        let edited = edit_content("f", original, &replacements);
        let previews = build_previews("f", original, &edited.content, &edited.changes, 1);
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].line, 3);
        assert_eq!(previews[0].context.before, vec!["l2", "Dooi", "l4"]);
        assert_eq!(previews[0].context.after, vec!["l2", "Acme", "l4"]);
    }

    #[test]
    fn dry_run_leaves_files_untouched() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.md"), "Dooi rocks").unwrap();

        let result = apply_edit_plan(
            temp.path(),
            &plan(&["*.md"], vec![TextReplacement::literal("Dooi", "Acme")], true),
        )
        .unwrap();
        assert_eq!(result.changed_files, vec!["a.md"]);
        assert!(result.previews.is_some());
        assert_eq!(
            fs::read_to_string(temp.path().join("a.md")).unwrap(),
            "Dooi rocks"
        );
    }

    #[test]
    fn change_limit_is_checked_before_writing() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["a.md", "b.md", "c.md"] {
            fs::write(temp.path().join(name), "Dooi").unwrap();
        }

        let mut at_limit = plan(&["*.md"], vec![TextReplacement::literal("Dooi", "X")], true);
        at_limit.options.limit_changed_files = Some(3);
        assert_eq!(apply_edit_plan(temp.path(), &at_limit).unwrap().changed_files.len(), 3);

        let mut over = plan(&["*.md"], vec![TextReplacement::literal("Dooi", "X")], false);
        over.options.limit_changed_files = Some(2);
        let err = apply_edit_plan(temp.path(), &over).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TooManyChanges);
        assert_eq!(err.details["fileCount"], 3);
        for name in ["a.md", "b.md", "c.md"] {
            assert_eq!(fs::read_to_string(temp.path().join(name)).unwrap(), "Dooi");
        }
    }

    #[test]
    fn binary_files_are_not_edited() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("logo.svg"), "Dooi").unwrap();
        fs::write(temp.path().join("a.md"), "Dooi").unwrap();

        let result = apply_edit_plan(
            temp.path(),
            &plan(&["*.svg", "*.md"], vec![TextReplacement::literal("Dooi", "X")], false),
        )
        .unwrap();
        assert_eq!(result.changed_files, vec!["a.md"]);
        assert_eq!(fs::read_to_string(temp.path().join("logo.svg")).unwrap(), "Dooi");
        assert!(result.previews.is_none());
    }

    #[test]
    fn only_known_text_extensions_are_edited() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["LICENSE", "yarn.lock", "app.js.map", ".gitignore", "page.tsx"] {
            fs::write(temp.path().join(name), "Dooi").unwrap();
        }

        let result = apply_edit_plan(
            temp.path(),
            &plan(&["*"], vec![TextReplacement::literal("Dooi", "X")], false),
        )
        .unwrap();
        let mut changed = result.changed_files.clone();
        changed.sort();
        assert_eq!(changed, vec![".gitignore", "page.tsx"]);
        for name in ["LICENSE", "yarn.lock", "app.js.map"] {
            assert_eq!(fs::read_to_string(temp.path().join(name)).unwrap(), "Dooi");
        }
    }
}

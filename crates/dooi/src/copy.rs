//! Copy planning and execution from a staging directory into a project.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{default_exclude, default_include};
use crate::error::{DooiError, ErrorCode, Result};
use crate::guard::{ensure_writable_directory, validate_path_within};
use crate::mapping::{PathMapping, PathStrategy, resolve_mapping};
use crate::matcher::{match_files, require_matches};

/// What to do when a destination file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    #[default]
    Skip,
    Overwrite,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CopyAction {
    pub from: PathBuf,
    pub to: PathBuf,
    pub exists_action: ConflictMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct CopyPlan {
    pub actions: Vec<CopyAction>,
}

impl CopyPlan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Outcome buckets; every destination path lands in at most one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct CopyResult {
    pub installed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub overwritten: Vec<PathBuf>,
    pub renamed: Vec<PathBuf>,
}

impl CopyResult {
    pub fn total(&self) -> usize {
        self.installed.len() + self.skipped.len() + self.overwritten.len() + self.renamed.len()
    }

    pub fn extend(&mut self, other: CopyResult) {
        self.installed.extend(other.installed);
        self.skipped.extend(other.skipped);
        self.overwritten.extend(other.overwritten);
        self.renamed.extend(other.renamed);
    }
}

/// Builds one action per matched file under `stage_dir`.
///
/// The destination root is created if needed and every mapped destination must stay inside it.
pub fn plan<I: AsRef<str>, E: AsRef<str>>(
    stage_dir: &Path,
    dest_root: &Path,
    mapping: &PathMapping,
    include: &[I],
    exclude: &[E],
    mode: ConflictMode,
) -> Result<CopyPlan> {
    ensure_writable_directory(dest_root)?;

    let files = require_matches(match_files(stage_dir, include, exclude)?, include, exclude)?;

    let mut actions = Vec::with_capacity(files.len());
    for file in files.into_iter().filter(|file| !file.is_directory) {
        let mapped = mapping.apply(&file.relative_path);
        let to = validate_path_within(dest_root, &mapped)?;
        actions.push(CopyAction {
            from: file.full_path,
            to,
            exists_action: mode,
        });
    }

    tracing::debug!(
        stage = %stage_dir.display(),
        dest = %dest_root.display(),
        actions = actions.len(),
        "planned copy"
    );
    Ok(CopyPlan { actions })
}

/// Runs every action; a failing action is logged and left out of the result.
pub fn execute(plan: &CopyPlan, dry_run: bool) -> CopyResult {
    let mut result = CopyResult::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for action in &plan.actions {
        match execute_action(action, dry_run, &claimed) {
            Ok(outcome) => {
                let (bucket, path) = match outcome {
                    Outcome::Installed(path) => (&mut result.installed, path),
                    Outcome::Skipped(path) => (&mut result.skipped, path),
                    Outcome::Overwritten(path) => (&mut result.overwritten, path),
                    Outcome::Renamed(path) => (&mut result.renamed, path),
                };
                claimed.insert(path.clone());
                bucket.push(path);
            }
            Err(err) => {
                tracing::warn!(
                    from = %action.from.display(),
                    to = %action.to.display(),
                    error = %err,
                    "copy action failed"
                );
            }
        }
    }

    result
}

enum Outcome {
    Installed(PathBuf),
    Skipped(PathBuf),
    Overwritten(PathBuf),
    Renamed(PathBuf),
}

fn execute_action(
    action: &CopyAction,
    dry_run: bool,
    claimed: &HashSet<PathBuf>,
) -> Result<Outcome> {
    let taken = |path: &Path| claimed.contains(path) || path.exists();

    if claimed.contains(&action.to) && action.exists_action != ConflictMode::Rename {
        return Err(DooiError::internal(format!(
            "{} is already produced by another file in this plan",
            action.to.display()
        )));
    }

    if !taken(&action.to) {
        copy_file(&action.from, &action.to, dry_run)?;
        return Ok(Outcome::Installed(action.to.clone()));
    }

    match action.exists_action {
        ConflictMode::Skip => Ok(Outcome::Skipped(action.to.clone())),
        ConflictMode::Overwrite => {
            copy_file(&action.from, &action.to, dry_run)?;
            Ok(Outcome::Overwritten(action.to.clone()))
        }
        ConflictMode::Rename => {
            let renamed = unique_sibling(&action.to, taken);
            copy_file(&action.from, &renamed, dry_run)?;
            Ok(Outcome::Renamed(renamed))
        }
    }
}

fn copy_file(from: &Path, to: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

/// First `<stem>_<n><.ext>` next to `path` (n = 1, 2, ...) that `taken` rejects.
fn unique_sibling(path: &Path, taken: impl Fn(&Path) -> bool) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1usize;
    loop {
        let candidate = path.with_file_name(format!("{stem}_{counter}{extension}"));
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Arguments of the stand-alone copy stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub stage_dir: PathBuf,
    pub dest_root: PathBuf,
    pub path_map: Option<PathMapping>,
    pub path_strategy: Option<PathStrategy>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub mode: ConflictMode,
    pub dry_run: bool,
}

impl InstallOptions {
    /// Skip mode with dry run enabled; callers opt out of dry run explicitly.
    pub fn new(stage_dir: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            stage_dir: stage_dir.into(),
            dest_root: dest_root.into(),
            path_map: None,
            path_strategy: None,
            include: None,
            exclude: None,
            mode: ConflictMode::default(),
            dry_run: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    pub dry_run: bool,
    pub actions: Vec<CopyAction>,
    #[serde(flatten)]
    pub result: CopyResult,
}

/// Plans and executes a copy from an existing staging directory.
pub fn install(options: &InstallOptions) -> Result<InstallOutcome> {
    if !options.stage_dir.is_dir() {
        return Err(DooiError::with_message(
            ErrorCode::StageMissing,
            format!("Staging directory not found: {}", options.stage_dir.display()),
        )
        .detail("stageDir", options.stage_dir.display().to_string()));
    }

    let mapping = resolve_mapping(options.path_strategy, options.path_map.as_ref())?;
    let include = options.include.clone().unwrap_or_else(default_include);
    let exclude = options.exclude.clone().unwrap_or_else(default_exclude);

    let plan = plan(
        &options.stage_dir,
        &options.dest_root,
        &mapping,
        &include,
        &exclude,
        options.mode,
    )?;
    let result = execute(&plan, options.dry_run);

    tracing::info!(
        dest = %options.dest_root.display(),
        installed = result.installed.len(),
        skipped = result.skipped.len(),
        overwritten = result.overwritten.len(),
        renamed = result.renamed.len(),
        dry_run = options.dry_run,
        "copy stage finished"
    );

    Ok(InstallOutcome {
        dry_run: options.dry_run,
        actions: plan.actions,
        result,
    })
}

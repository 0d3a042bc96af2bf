//! End-to-end application of one artifact: fetch, install, edit, dependencies.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::copy::{ConflictMode, CopyResult, InstallOptions, install};
use crate::edit::{EditOptions, EditPlan, EditResult, TextReplacement, apply_edit_plan};
use crate::error::{DooiError, ErrorCode, Result};
use crate::fetch::{DooiClient, FetchRequest, StagingArtifact, remove_stage};
use crate::mapping::{PathMapping, PathStrategy, resolve_mapping};
use crate::parse::ComponentMeta;
use crate::pm::{
    InstallRequest, InstallResult, PackageManager, PackageManifest, install_packages,
    read_manifest, resolve_package_manager,
};

const BRAND_INCLUDE: &[&str] = &[
    "**/*.tsx", "**/*.ts", "**/*.jsx", "**/*.js", "**/*.md", "**/*.json",
];
const BRAND_EXCLUDE: &[&str] = &["node_modules/**", ".git/**", "dist/**", "build/**"];
const BRAND_CHANGED_FILE_LIMIT: usize = 100;
const BRAND_PREVIEW_LINES: usize = 3;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOptions {
    pub id: String,
    pub dest_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// `next-app` or `vite-react`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_map: Option<PathMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_plan: Option<EditPlan>,
    #[serde(default = "default_true")]
    pub auto_deps: bool,
    #[serde(default)]
    pub dry_run: bool,
}

impl WorkflowOptions {
    pub fn new(id: impl Into<String>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dest_root: dest_root.into(),
            brand: None,
            path_strategy: None,
            path_map: None,
            edit_plan: None,
            auto_deps: true,
            dry_run: false,
        }
    }
}

/// Checks required fields and returns the parsed path strategy.
pub fn validate_workflow_options(options: &WorkflowOptions) -> Result<Option<PathStrategy>> {
    if options.id.trim().is_empty() {
        return Err(DooiError::invalid_input("Workflow ID is required"));
    }
    if options.dest_root.as_os_str().is_empty() {
        return Err(DooiError::invalid_input("Destination root is required"));
    }
    options
        .path_strategy
        .as_deref()
        .map(str::parse::<PathStrategy>)
        .transpose()
}

/// Replaces placeholder tokens and the product name with `brand`.
pub fn brand_edit_plan(brand: &str) -> EditPlan {
    let lower = brand.to_lowercase();
    EditPlan {
        include: BRAND_INCLUDE.iter().map(|p| p.to_string()).collect(),
        exclude: BRAND_EXCLUDE.iter().map(|p| p.to_string()).collect(),
        replacements: vec![
            TextReplacement::literal("{{BRAND}}", brand),
            TextReplacement::literal("{{COMPANY}}", brand),
            TextReplacement::literal("{{NAME}}", brand),
            TextReplacement::literal("Dooi", brand),
            TextReplacement::literal("dooi", lower),
        ],
        options: EditOptions {
            dry_run: false,
            limit_changed_files: Some(BRAND_CHANGED_FILE_LIMIT),
            preview_context_lines: BRAND_PREVIEW_LINES,
        },
    }
}

/// One stage's outcome. `output` is flattened into the record when present.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct StepRecord<T> {
    pub success: bool,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub output: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> StepRecord<T> {
    pub fn output(&self) -> Option<&T> {
        self.output.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchStep {
    pub stage_dir: PathBuf,
    pub files: Vec<String>,
    pub meta: ComponentMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct InstallStep {
    #[serde(flatten)]
    pub result: CopyResult,
    /// Artifact ids installed through `uses`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepsStep {
    pub pm: PackageManager,
    pub installed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub peer_installed: Vec<String>,
    /// Requested packages the project's `package.json` already declares.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub already_declared: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSteps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch: Option<StepRecord<FetchStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<StepRecord<InstallStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_edit: Option<StepRecord<EditResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_deps: Option<StepRecord<DepsStep>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub total_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct WorkflowResult {
    pub success: bool,
    pub steps: WorkflowSteps,
    pub summary: WorkflowSummary,
}

impl WorkflowResult {
    fn record<T>(&mut self, label: &str, outcome: Result<T>) -> StepRecord<T> {
        self.summary.total_steps += 1;
        match outcome {
            Ok(output) => {
                self.summary.successful_steps += 1;
                StepRecord {
                    success: true,
                    output: Some(output),
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(
                    step = label,
                    code = %err.code,
                    error = %err,
                    "workflow step failed"
                );
                self.summary.failed_steps += 1;
                self.summary.errors.push(format!("{label} failed: {}", err.message));
                StepRecord {
                    success: false,
                    output: None,
                    error: Some(err.message),
                }
            }
        }
    }

    fn finish(mut self) -> Self {
        self.success = self.summary.failed_steps == 0;
        self
    }
}

/// Runs the pipeline for `options.id` against `options.dest_root`.
///
/// Fetch and install failures stop the pipeline; edit and dependency failures are recorded and
/// the remaining stages still run. Invalid options are returned as an error before any stage.
pub async fn execute_workflow(
    client: &DooiClient,
    options: &WorkflowOptions,
) -> Result<WorkflowResult> {
    let strategy = validate_workflow_options(options)?;
    let mapping = resolve_mapping(strategy, options.path_map.as_ref())?;
    let mut result = WorkflowResult::default();

    tracing::info!(
        id = %options.id,
        dest = %options.dest_root.display(),
        dry_run = options.dry_run,
        "starting workflow"
    );

    let fetched = client.fetch(&FetchRequest::new(options.id.clone())).await;
    let artifact = match fetched {
        Ok(artifact) => {
            let record = result.record(
                "Fetch",
                Ok(FetchStep {
                    stage_dir: artifact.stage_dir.clone(),
                    files: artifact.files.clone(),
                    meta: artifact.meta.clone(),
                }),
            );
            result.steps.fetch = Some(record);
            artifact
        }
        Err(err) => {
            result.steps.fetch = Some(result.record("Fetch", Err(err)));
            return Ok(result.finish());
        }
    };

    let mut metas = vec![artifact.meta.clone()];
    let installed = install_step(client, options, &mapping, &artifact, &mut metas).await;
    let install_failed = installed.is_err();
    result.steps.install = Some(result.record("Install", installed));
    if install_failed {
        return Ok(result.finish());
    }

    if let Some(plan) = effective_edit_plan(options) {
        let edited = apply_edit_plan(&options.dest_root, &plan);
        result.steps.text_edit = Some(result.record("Text edit", edited));
    }

    let (dependencies, peers) = collect_dependencies(&metas);
    if options.auto_deps && !dependencies.is_empty() {
        let deps =
            deps_step(client, &options.dest_root, dependencies, peers, options.dry_run).await;
        result.steps.install_deps = Some(result.record("Dependency installation", deps));
    }

    let result = result.finish();
    tracing::info!(
        id = %options.id,
        success = result.success,
        failed_steps = result.summary.failed_steps,
        "workflow finished"
    );
    Ok(result)
}

async fn install_step(
    client: &DooiClient,
    options: &WorkflowOptions,
    mapping: &PathMapping,
    artifact: &StagingArtifact,
    metas: &mut Vec<ComponentMeta>,
) -> Result<InstallStep> {
    let mut step = InstallStep::default();
    let composite = !artifact.meta.uses.is_empty();

    match copy_stage(&artifact.stage_dir, options, mapping) {
        Ok(result) => step.result.extend(result),
        Err(err) if composite && err.code() == ErrorCode::NoMatches => {
            tracing::debug!(id = %artifact.id, "composite artifact has no files of its own");
        }
        Err(err) => return Err(err),
    }

    // One level only: components pulled in here do not expand their own `uses`.
    for id in &artifact.meta.uses {
        let sub = client
            .fetch(&FetchRequest::new(id.clone()))
            .await
            .map_err(|err| err.context(format!("used component {id}")))?;
        let copied = copy_stage(&sub.stage_dir, options, mapping);
        if let Err(err) = remove_stage(&sub.stage_dir) {
            tracing::warn!(
                stage = %sub.stage_dir.display(),
                error = %err,
                "failed to remove stage"
            );
        }
        step.result
            .extend(copied.map_err(|err| err.context(format!("used component {id}")))?);
        step.components.push(id.clone());
        metas.push(sub.meta);
    }

    Ok(step)
}

fn copy_stage(
    stage_dir: &Path,
    options: &WorkflowOptions,
    mapping: &PathMapping,
) -> Result<CopyResult> {
    let mut install_options = InstallOptions::new(stage_dir, &options.dest_root);
    install_options.path_map = Some(mapping.clone());
    install_options.mode = ConflictMode::Skip;
    install_options.dry_run = options.dry_run;
    Ok(install(&install_options)?.result)
}

fn effective_edit_plan(options: &WorkflowOptions) -> Option<EditPlan> {
    let brand = options.brand.as_deref().filter(|brand| !brand.trim().is_empty());
    let mut plan = options
        .edit_plan
        .clone()
        .filter(|plan| !plan.is_empty())
        .or_else(|| brand.map(brand_edit_plan))?;
    plan.options.dry_run = options.dry_run;
    Some(plan)
}

/// Dependencies and peers across the artifact and its used components, first occurrence wins.
fn collect_dependencies(metas: &[ComponentMeta]) -> (Vec<String>, Vec<String>) {
    let mut dependencies: Vec<String> = Vec::new();
    let mut peers: Vec<String> = Vec::new();
    for meta in metas {
        for dep in &meta.dependencies {
            if !dependencies.contains(dep) {
                dependencies.push(dep.clone());
            }
        }
        for peer in &meta.peer_dependencies {
            if !peers.contains(peer) {
                peers.push(peer.clone());
            }
        }
    }
    (dependencies, peers)
}

async fn deps_step(
    client: &DooiClient,
    dest_root: &Path,
    dependencies: Vec<String>,
    peers: Vec<String>,
    dry_run: bool,
) -> Result<DepsStep> {
    let pm = resolve_package_manager(dest_root, None)?;
    let manifest = match read_manifest(dest_root) {
        Ok(manifest) => manifest.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable package.json");
            PackageManifest::default()
        }
    };
    let mut already_declared = Vec::new();
    let dependencies = undeclared(&manifest, dependencies, &mut already_declared);
    let peers = undeclared(&manifest, peers, &mut already_declared);

    if dry_run {
        return Ok(DepsStep {
            pm,
            installed: dependencies,
            peer_installed: peers,
            already_declared,
            dry_run,
        });
    }

    let installed = if dependencies.is_empty() {
        Vec::new()
    } else {
        run_install(client, dest_root, pm, dependencies).await?
    };
    let peer_installed = if peers.is_empty() {
        Vec::new()
    } else {
        run_install(client, dest_root, pm, peers).await?
    };

    Ok(DepsStep {
        pm,
        installed,
        peer_installed,
        already_declared,
        dry_run,
    })
}

/// Moves packages the manifest already declares into `declared`, returning the rest.
fn undeclared(
    manifest: &PackageManifest,
    packages: Vec<String>,
    declared: &mut Vec<String>,
) -> Vec<String> {
    let (present, missing): (Vec<String>, Vec<String>) =
        packages.into_iter().partition(|package| manifest.is_declared(package));
    if !present.is_empty() {
        tracing::info!(packages = ?present, "skipping dependencies already declared");
    }
    declared.extend(present);
    missing
}

async fn run_install(
    client: &DooiClient,
    dest_root: &Path,
    pm: PackageManager,
    packages: Vec<String>,
) -> Result<Vec<String>> {
    let mut request = InstallRequest::new(dest_root, packages);
    request.pm = Some(pm);
    request.timeout = client.config().timeout;
    let result = install_packages(client.runner(), &request).await?;
    ensure_installed(result)
}

fn ensure_installed(result: InstallResult) -> Result<Vec<String>> {
    if result.success {
        return Ok(result.installed_packages);
    }
    Err(DooiError::with_message(ErrorCode::PmExit, result.errors.join(": "))
        .detail("pm", result.pm.binary())
        .detail("exitCode", result.exit_code))
}

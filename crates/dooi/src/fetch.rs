//! Fetch adapter: runs the `dooi-ui` CLI and stages its output on disk.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::json;

use crate::config::{
    DooiConfig, STAGE_DIR_PREFIX, STAGE_MANIFEST_FILE, STAGE_META_DIR, STAGE_META_FILE,
};
use crate::error::{DooiError, ErrorCode, Result};
use crate::guard::{is_safe_path, sanitize_filename};
use crate::matcher::FileMatcher;
use crate::parse::{CatalogItem, ComponentMeta, parse_component_meta, parse_list_output};
use crate::runner::{CommandOutput, CommandRunner, Invocation, ProcessRunner};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ListResult {
    pub items: Vec<CatalogItem>,
    pub raw: RawOutput,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: String,
    pub git_ref: Option<String>,
    pub timeout: Option<Duration>,
    pub env: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// A fetched artifact; `files` are relative to `stage_dir` and never include staging metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StagingArtifact {
    pub id: String,
    pub stage_dir: PathBuf,
    pub files: Vec<String>,
    pub meta: ComponentMeta,
    pub raw: RawOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub id: String,
    pub stage_dir: PathBuf,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct BatchFetchResult {
    pub stages: Vec<StageSummary>,
}

/// Handle on the external CLI.
#[derive(Clone)]
pub struct DooiClient {
    runner: Arc<dyn CommandRunner>,
    config: DooiConfig,
}

impl DooiClient {
    pub fn new(config: DooiConfig) -> Self {
        Self::with_runner(Arc::new(ProcessRunner), config)
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>, config: DooiConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &DooiConfig {
        &self.config
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    fn invocation(&self, cwd: &Path, timeout: Duration) -> Invocation {
        Invocation::new(&self.config.program, cwd, timeout)
            .args(self.config.program_args.iter().cloned())
    }

    fn cli_missing(&self, output: &CommandOutput) -> bool {
        let mut programs = vec![self.config.program.as_str()];
        programs.extend(self.config.program_args.iter().map(String::as_str));
        output.is_not_found(&programs)
    }

    /// Lists the catalog via `<cli> list`.
    pub async fn list(&self) -> Result<ListResult> {
        fs::create_dir_all(&self.config.stage_root)?;
        let invocation = self
            .invocation(&self.config.stage_root, self.config.timeout)
            .args(["list"]);
        let output = self.runner.run(&invocation).await?;

        if !output.success() {
            if self.cli_missing(&output) {
                return Err(cli_not_found(&output));
            }
            return Err(DooiError::with_message(
                ErrorCode::ListUnavailable,
                format!("dooi-ui list failed with exit code {}", output.exit_code),
            )
            .detail("exitCode", output.exit_code)
            .detail("stderr", output.stderr));
        }

        let items = parse_list_output(&output.stdout);
        tracing::debug!(count = items.len(), "listed catalog");
        Ok(ListResult {
            items,
            raw: RawOutput {
                stdout: output.stdout,
                stderr: output.stderr,
            },
        })
    }

    /// Runs `<cli> get <id>` in a fresh staging directory and materializes the result there.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<StagingArtifact> {
        validate_artifact_id(&request.id)?;
        let stage_dir = create_stage_dir(&self.config.stage_root, &request.id)?;

        match self.fetch_into(request, &stage_dir).await {
            Ok(artifact) => Ok(artifact),
            Err(err) => {
                if let Err(cleanup) = fs::remove_dir_all(&stage_dir) {
                    tracing::warn!(
                        stage = %stage_dir.display(),
                        error = %cleanup,
                        "failed to remove stage"
                    );
                }
                Err(err)
            }
        }
    }

    async fn fetch_into(
        &self,
        request: &FetchRequest,
        stage_dir: &Path,
    ) -> Result<StagingArtifact> {
        let mut invocation = self
            .invocation(stage_dir, request.timeout.unwrap_or(self.config.timeout))
            .args(["get", request.id.as_str()])
            .envs(&request.env);
        if let Some(git_ref) = &request.git_ref {
            invocation = invocation.args(["--ref", git_ref.as_str()]);
        }

        tracing::info!(id = %request.id, stage = %stage_dir.display(), "fetching artifact");
        let output = self.runner.run(&invocation).await?;
        if !output.success() {
            if self.cli_missing(&output) {
                return Err(cli_not_found(&output));
            }
            return Err(DooiError::with_message(
                ErrorCode::FetchFailed,
                format!("Failed to fetch {}", request.id),
            )
            .detail("id", request.id.as_str())
            .detail("exitCode", output.exit_code)
            .detail("stderr", output.stderr));
        }

        let meta = parse_component_meta(&request.id, &output.stdout);
        materialize(stage_dir, &meta)?;
        let files = list_stage_files(stage_dir)?;

        Ok(StagingArtifact {
            id: request.id.clone(),
            stage_dir: stage_dir.to_path_buf(),
            files,
            meta,
            raw: RawOutput {
                stdout: output.stdout,
                stderr: output.stderr,
            },
        })
    }

    /// Fetches each distinct id in order; the first failure aborts the batch.
    pub async fn fetch_batch(&self, ids: &[String]) -> Result<BatchFetchResult> {
        let mut seen = HashSet::new();
        let mut result = BatchFetchResult::default();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let artifact = self.fetch(&FetchRequest::new(id.clone())).await?;
            result.stages.push(StageSummary {
                id: artifact.id,
                stage_dir: artifact.stage_dir,
                files: artifact.files,
            });
        }
        Ok(result)
    }
}

fn cli_not_found(output: &CommandOutput) -> DooiError {
    DooiError::new(ErrorCode::CliNotFound).detail("stderr", output.stderr.clone())
}

fn validate_artifact_id(id: &str) -> Result<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(DooiError::invalid_input("Artifact id is required"));
    }
    if !is_safe_path(id) || id.starts_with('/') || id.split('/').any(|s| s == "..") {
        return Err(DooiError::invalid_input(format!("Invalid artifact id: {id}")).detail("id", id));
    }
    Ok(())
}

fn create_stage_dir(root: &Path, id: &str) -> Result<PathBuf> {
    let failed = |err: std::io::Error| {
        DooiError::with_message(
            ErrorCode::StageCreationFailed,
            format!("Failed to create staging directory under {}", root.display()),
        )
        .detail("reason", err.to_string())
    };

    fs::create_dir_all(root).map_err(failed)?;
    let prefix = format!("{STAGE_DIR_PREFIX}{}-", sanitize_filename(&id.replace('/', "-")));
    let dir = tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(root)
        .map_err(failed)?;
    Ok(dir.keep())
}

/// Where a fetched code block lands inside the stage.
pub fn code_file_path(id: &str) -> PathBuf {
    let segments: Vec<String> = id
        .split('/')
        .filter(|s| !s.is_empty())
        .map(sanitize_filename)
        .collect();
    match segments.as_slice() {
        [] => PathBuf::from("components/component.tsx"),
        [name] => PathBuf::from("components").join(format!("{name}.tsx")),
        [category, rest @ ..] if category == "ui" => {
            PathBuf::from("components/ui").join(format!("{}.tsx", rest.join("-")))
        }
        [category, rest @ ..] => PathBuf::from(category).join(format!("{}.tsx", rest.join("-"))),
    }
}

fn materialize(stage_dir: &Path, meta: &ComponentMeta) -> Result<()> {
    if let Some(code) = &meta.code_block {
        let target = stage_dir.join(code_file_path(&meta.id));
        if target.exists() {
            tracing::debug!(path = %target.display(), "CLI already wrote the code file");
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, format!("{code}\n"))?;
        }
    }

    let meta_dir = stage_dir.join(STAGE_META_DIR);
    fs::create_dir_all(&meta_dir)?;
    fs::write(
        meta_dir.join(STAGE_META_FILE),
        serde_json::to_string_pretty(meta)?,
    )?;

    if !meta.dependencies.is_empty() || !meta.peer_dependencies.is_empty() {
        let latest = |packages: &[String]| -> serde_json::Map<String, serde_json::Value> {
            packages
                .iter()
                .map(|name| (name.clone(), json!("latest")))
                .collect()
        };
        let manifest = json!({
            "name": format!("dooi-stage-{}", meta.id.replace('/', "-")),
            "private": true,
            "dependencies": latest(&meta.dependencies),
            "peerDependencies": latest(&meta.peer_dependencies),
        });
        fs::write(
            meta_dir.join(STAGE_MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;
    }
    Ok(())
}

fn list_stage_files(stage_dir: &Path) -> Result<Vec<String>> {
    let meta_glob = format!("{STAGE_META_DIR}/**");
    let matcher = FileMatcher::new(&["**"], &[STAGE_META_DIR, meta_glob.as_str()])?;
    Ok(matcher
        .walk(stage_dir)?
        .into_iter()
        .filter(|file| !file.is_directory)
        .map(|file| file.relative_path)
        .collect())
}

/// Metadata written by [`DooiClient::fetch`] into `stage_dir`.
pub fn read_stage_meta(stage_dir: &Path) -> Result<Option<ComponentMeta>> {
    if !stage_dir.is_dir() {
        return Err(DooiError::with_message(
            ErrorCode::StageMissing,
            format!("Staging directory not found: {}", stage_dir.display()),
        )
        .detail("stageDir", stage_dir.display().to_string()));
    }
    let path = stage_dir.join(STAGE_META_DIR).join(STAGE_META_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    let meta = serde_json::from_str(&raw).map_err(|err| {
        DooiError::with_message(ErrorCode::ParseMeta, format!("Invalid stage metadata: {err}"))
            .detail("path", path.display().to_string())
    })?;
    Ok(Some(meta))
}

/// Artifact ids the staged artifact composes.
pub fn resolve_uses(stage_dir: &Path) -> Result<Vec<String>> {
    Ok(read_stage_meta(stage_dir)?
        .map(|meta| meta.uses)
        .unwrap_or_default())
}

/// Deletes a staging directory created by [`DooiClient::fetch`].
pub fn remove_stage(stage_dir: &Path) -> Result<()> {
    if stage_dir.exists() {
        fs::remove_dir_all(stage_dir)?;
        tracing::debug!(stage = %stage_dir.display(), "removed stage");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScriptedRunner;

    fn client(runner: ScriptedRunner, root: &Path) -> DooiClient {
        DooiClient::with_runner(
            Arc::new(runner),
            DooiConfig::default().with_stage_root(root),
        )
    }

    #[test]
    fn code_paths_follow_category() {
        assert_eq!(code_file_path("ui/button"), PathBuf::from("components/ui/button.tsx"));
        assert_eq!(code_file_path("cards/glass"), PathBuf::from("cards/glass.tsx"));
        assert_eq!(code_file_path("hero"), PathBuf::from("components/hero.tsx"));
    }

    #[tokio::test]
    async fn fetch_stages_code_and_metadata() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().on("get", |_| {
            Ok(CommandOutput {
                stdout: concat!(
                    "Component: Button\n",
                    "npm install clsx\n",
                    "Component Code:\n",
                    "export const Button = 1;\n",
                )
                .into(),
                ..CommandOutput::default()
            })
        });
        let client = client(runner, root.path());

        let artifact = client.fetch(&FetchRequest::new("ui/button")).await.unwrap();
        assert!(artifact.stage_dir.starts_with(root.path()));
        assert_eq!(artifact.files, vec!["components/ui/button.tsx"]);
        assert_eq!(artifact.meta.dependencies, vec!["clsx"]);

        let manifest: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(artifact.stage_dir.join(".dooi/package.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["dependencies"]["clsx"], "latest");
        assert!(resolve_uses(&artifact.stage_dir).unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_are_classified_and_stage_removed() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.push(CommandOutput {
            stdout: String::new(),
            stderr: "sh: dooi-ui: command not found".into(),
            exit_code: 127,
        });
        runner.push(CommandOutput {
            stdout: String::new(),
            stderr: "unknown component".into(),
            exit_code: 1,
        });
        let client = client(runner, root.path());

        let err = client.fetch(&FetchRequest::new("ui/x")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CliNotFound);
        let err = client.fetch(&FetchRequest::new("ui/x")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FetchFailed);
        assert_eq!(err.details["exitCode"], 1);
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn registry_not_found_is_a_fetch_failure() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.push(CommandOutput {
            stdout: String::new(),
            stderr: "Error: Component 'ui/nope' not found in registry".into(),
            exit_code: 1,
        });
        runner.push(CommandOutput {
            stdout: String::new(),
            stderr: "npm ERR! could not determine executable to run dooi-ui".into(),
            exit_code: 1,
        });
        let client = client(runner, root.path());

        let err = client.fetch(&FetchRequest::new("ui/nope")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FetchFailed);
        assert_eq!(
            err.details["stderr"],
            "Error: Component 'ui/nope' not found in registry"
        );
        let err = client.fetch(&FetchRequest::new("ui/nope")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CliNotFound);
    }

    #[tokio::test]
    async fn ref_is_forwarded_and_batch_dedupes() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let client = DooiClient::with_runner(
            runner.clone(),
            DooiConfig::default().with_stage_root(root.path()),
        );

        let mut request = FetchRequest::new("hero");
        request.git_ref = Some("v2".into());
        client.fetch(&request).await.unwrap();
        assert_eq!(
            runner.calls()[0].command_line(),
            "npx dooi-ui get hero --ref v2"
        );

        let batch = client
            .fetch_batch(&["a".into(), "b".into(), "a".into()])
            .await
            .unwrap();
        assert_eq!(batch.stages.len(), 2);
    }

    #[test]
    fn resolve_uses_requires_existing_stage() {
        let root = tempfile::tempdir().unwrap();
        let err = resolve_uses(&root.path().join("gone")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StageMissing);
    }

    #[test]
    fn traversal_ids_are_rejected() {
        assert_eq!(
            validate_artifact_id("../etc").unwrap_err().code(),
            ErrorCode::InvalidInput
        );
    }
}

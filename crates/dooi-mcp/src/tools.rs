use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::schemars::JsonSchema;
use rmcp::{tool, tool_router};
use serde::{Deserialize, Serialize};

use dooi::{
    BatchFetchResult, ConflictMode, EditPlan, EditResult, FetchRequest, InstallOptions,
    InstallOutcome, InstallRequest, ListResult, PackageManager, PathMapping, PathStrategy,
    StagingArtifact, WorkflowOptions, WorkflowResult, apply_edit_plan, execute_workflow, install,
    install_packages, resolve_uses,
};

use crate::error::{McpError, invalid_params, to_mcp_error};
use crate::server::DooiMcpServer;

pub(crate) fn build_tool_router() -> ToolRouter<DooiMcpServer> {
    DooiMcpServer::tool_router()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListArgs {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptionsArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchArgs {
    #[schemars(description = "Component or template id, e.g. 'ui/button' or 'landing-morphic'.")]
    pub id: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Git ref forwarded to the CLI as --ref.")]
    pub git_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FetchOptionsArgs>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveUsesArgs {
    pub stage_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveUsesOutput {
    pub required_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchBatchArgs {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallArgs {
    pub stage_dir: PathBuf,
    pub dest_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_map: Option<PathMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "'next-app' or 'vite-react'.")]
    pub path_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ConflictMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Defaults to true; pass false to write files.")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextEditArgs {
    pub dest_root: PathBuf,
    pub plan: EditPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallDepsArgs {
    pub cwd: PathBuf,
    pub packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm: Option<PackageManager>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<String>>,
    #[serde(default)]
    pub dev: bool,
    #[serde(default)]
    pub peer: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallDepsOutput {
    pub success: bool,
    pub pm: PackageManager,
    pub args: Vec<String>,
    pub exit_code: i32,
    pub installed_packages: Vec<String>,
    pub stdout_tail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[tool_router]
impl DooiMcpServer {
    #[tool(
        name = "dooi.list",
        description = "List dooi-ui components and templates with their descriptions and tags."
    )]
    pub(crate) async fn list(
        &self,
        Parameters(_args): Parameters<ListArgs>,
    ) -> Result<Json<ListResult>, McpError> {
        self.client.list().await.map(Json).map_err(to_mcp_error)
    }

    #[tool(
        name = "dooi.fetch",
        description = "Fetch a component or template into a fresh staging directory and return its files and parsed metadata."
    )]
    pub(crate) async fn fetch(
        &self,
        Parameters(args): Parameters<FetchArgs>,
    ) -> Result<Json<StagingArtifact>, McpError> {
        let options = args.options.unwrap_or_default();
        let request = FetchRequest {
            id: args.id,
            git_ref: args.git_ref,
            timeout: options.timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
            env: options.env.unwrap_or_default(),
        };
        self.client.fetch(&request).await.map(Json).map_err(to_mcp_error)
    }

    #[tool(
        name = "dooi.resolve.uses",
        description = "Return the component ids a staged template declares under 'Uses components'."
    )]
    pub(crate) async fn resolve_uses(
        &self,
        Parameters(args): Parameters<ResolveUsesArgs>,
    ) -> Result<Json<ResolveUsesOutput>, McpError> {
        let required_ids = resolve_uses(&args.stage_dir).map_err(to_mcp_error)?;
        Ok(Json(ResolveUsesOutput { required_ids }))
    }

    #[tool(
        name = "dooi.fetchBatch",
        description = "Fetch several components in order, each into its own staging directory. Duplicate ids are fetched once."
    )]
    pub(crate) async fn fetch_batch(
        &self,
        Parameters(args): Parameters<FetchBatchArgs>,
    ) -> Result<Json<BatchFetchResult>, McpError> {
        if args.ids.is_empty() {
            return Err(invalid_params("At least one id is required"));
        }
        self.client
            .fetch_batch(&args.ids)
            .await
            .map(Json)
            .map_err(to_mcp_error)
    }

    #[tool(
        name = "dooi.install",
        description = "Copy staged files into a project with path mapping and conflict handling. Runs as a dry run unless dryRun is false."
    )]
    pub(crate) async fn install(
        &self,
        Parameters(args): Parameters<InstallArgs>,
    ) -> Result<Json<InstallOutcome>, McpError> {
        let path_strategy = args
            .path_strategy
            .as_deref()
            .map(str::parse::<PathStrategy>)
            .transpose()
            .map_err(to_mcp_error)?;

        let mut options = InstallOptions::new(args.stage_dir, args.dest_root);
        options.path_map = args.path_map;
        options.path_strategy = path_strategy;
        options.include = args.include;
        options.exclude = args.exclude;
        options.mode = args.mode.unwrap_or_default();
        options.dry_run = args.dry_run.unwrap_or(true);

        install(&options).map(Json).map_err(to_mcp_error)
    }

    #[tool(
        name = "dooi.textEdit",
        description = "Apply literal or regex replacements to files under destRoot. Dry run by default, with previews."
    )]
    pub(crate) async fn text_edit(
        &self,
        Parameters(args): Parameters<TextEditArgs>,
    ) -> Result<Json<EditResult>, McpError> {
        apply_edit_plan(&args.dest_root, &args.plan)
            .map(Json)
            .map_err(to_mcp_error)
    }

    #[tool(
        name = "dooi.installDeps",
        description = "Install npm packages with the detected or requested package manager (npm, yarn, pnpm)."
    )]
    pub(crate) async fn install_deps(
        &self,
        Parameters(args): Parameters<InstallDepsArgs>,
    ) -> Result<Json<InstallDepsOutput>, McpError> {
        let mut request = InstallRequest::new(args.cwd, args.packages);
        request.pm = args.pm;
        request.flags = args.flags.unwrap_or_default();
        request.dev = args.dev;
        request.peer = args.peer;
        request.timeout = self.client.config().timeout;

        let result = install_packages(self.client.runner(), &request)
            .await
            .map_err(to_mcp_error)?;
        Ok(Json(InstallDepsOutput {
            success: result.success,
            pm: result.pm,
            stdout_tail: result.stdout_tail(),
            args: result.args,
            exit_code: result.exit_code,
            installed_packages: result.installed_packages,
            errors: result.errors,
        }))
    }

    #[tool(
        name = "dooi.workflow.applyComponent",
        description = "Fetch a component, install it into destRoot, optionally apply brand edits, and install its dependencies."
    )]
    pub(crate) async fn apply_component(
        &self,
        Parameters(options): Parameters<WorkflowOptions>,
    ) -> Result<Json<WorkflowResult>, McpError> {
        self.run_workflow(options).await
    }

    #[tool(
        name = "dooi.workflow.applyTemplate",
        description = "Fetch a template and every component it uses, install them into destRoot, apply brand edits, and install dependencies."
    )]
    pub(crate) async fn apply_template(
        &self,
        Parameters(options): Parameters<WorkflowOptions>,
    ) -> Result<Json<WorkflowResult>, McpError> {
        self.run_workflow(options).await
    }
}

impl DooiMcpServer {
    async fn run_workflow(
        &self,
        options: WorkflowOptions,
    ) -> Result<Json<WorkflowResult>, McpError> {
        execute_workflow(&self.client, &options)
            .await
            .map(Json)
            .map_err(to_mcp_error)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use dooi::{CommandOutput, DooiClient, DooiConfig, ScriptedRunner, TextReplacement};
    use rmcp::model::ErrorCode as RpcCode;

    use super::*;

    fn server(runner: ScriptedRunner, stage_root: &std::path::Path) -> DooiMcpServer {
        DooiMcpServer::with_client(DooiClient::with_runner(
            Arc::new(runner),
            DooiConfig::default().with_stage_root(stage_root),
        ))
    }

    #[test]
    fn router_registers_every_tool() {
        let router = build_tool_router();
        let mut names: Vec<String> = router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "dooi.fetch",
                "dooi.fetchBatch",
                "dooi.install",
                "dooi.installDeps",
                "dooi.list",
                "dooi.resolve.uses",
                "dooi.textEdit",
                "dooi.workflow.applyComponent",
                "dooi.workflow.applyTemplate",
            ]
        );
    }

    #[tokio::test]
    async fn text_edit_defaults_to_dry_run() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("page.tsx"), "<h1>Dooi</h1>\n").unwrap();
        let server = server(ScriptedRunner::new(), temp.path());

        let Json(result) = server
            .text_edit(Parameters(TextEditArgs {
                dest_root: temp.path().to_path_buf(),
                plan: EditPlan {
                    include: vec!["*.tsx".into()],
                    replacements: vec![TextReplacement::literal("Dooi", "Acme")],
                    ..EditPlan::default()
                },
            }))
            .await
            .unwrap();

        assert_eq!(result.changed_files, vec!["page.tsx"]);
        assert!(result.previews.is_some());
        let on_disk = fs::read_to_string(temp.path().join("page.tsx")).unwrap();
        assert_eq!(on_disk, "<h1>Dooi</h1>\n");
    }

    #[tokio::test]
    async fn install_deps_reports_tail_and_args() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("yarn.lock"), "").unwrap();
        let runner = ScriptedRunner::new().on("add", |_| {
            Ok(CommandOutput {
                stdout: "success Saved 1 new dependency.\ninfo Direct dependencies\n".into(),
                ..CommandOutput::default()
            })
        });
        let server = server(runner, temp.path());

        let Json(output) = server
            .install_deps(Parameters(InstallDepsArgs {
                cwd: temp.path().to_path_buf(),
                packages: vec!["clsx".into()],
                pm: None,
                flags: None,
                dev: true,
                peer: false,
            }))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.pm, PackageManager::Yarn);
        assert_eq!(output.args, vec!["add", "--dev", "clsx"]);
        assert_eq!(output.installed_packages, vec!["clsx"]);
        assert!(output.stdout_tail.contains("Direct dependencies"));
    }

    #[tokio::test]
    async fn validation_errors_surface_as_invalid_params() {
        let temp = tempfile::tempdir().unwrap();
        let server = server(ScriptedRunner::new(), temp.path());

        let err = server
            .install(Parameters(InstallArgs {
                stage_dir: temp.path().to_path_buf(),
                dest_root: temp.path().join("app"),
                path_map: None,
                path_strategy: Some("remix".into()),
                include: None,
                exclude: None,
                mode: None,
                dry_run: None,
            }))
            .await
            .err().unwrap();
        assert_eq!(err.code, RpcCode::INVALID_PARAMS);

        let err = server
            .fetch_batch(Parameters(FetchBatchArgs { ids: Vec::new() }))
            .await
            .err().unwrap();
        assert_eq!(err.code, RpcCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn fetch_forwards_ref_and_env() {
        let temp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().on("get", |_| {
            Ok(CommandOutput {
                stdout: "Component: Hero\nComponent Code:\nexport const Hero = 1;\n".into(),
                ..CommandOutput::default()
            })
        }));
        let server = DooiMcpServer::with_client(DooiClient::with_runner(
            runner.clone(),
            DooiConfig::default().with_stage_root(temp.path()),
        ));

        let Json(artifact) = server
            .fetch(Parameters(FetchArgs {
                id: "hero".into(),
                git_ref: Some("main".into()),
                options: Some(FetchOptionsArgs {
                    timeout_ms: Some(5_000),
                    env: Some(BTreeMap::from([("NO_COLOR".to_string(), "1".to_string())])),
                }),
            }))
            .await
            .unwrap();

        assert_eq!(artifact.meta.title, "Hero");
        assert_eq!(artifact.files, vec!["components/hero.tsx"]);
        let call = &runner.calls()[0];
        assert_eq!(call.command_line(), "npx dooi-ui get hero --ref main");
        assert_eq!(call.timeout, Duration::from_millis(5_000));
        assert_eq!(call.env.get("NO_COLOR").map(String::as_str), Some("1"));
    }
}

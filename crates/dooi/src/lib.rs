pub mod config;
pub mod copy;
pub mod edit;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod mapping;
pub mod matcher;
pub mod parse;
pub mod pm;
pub mod runner;
pub mod workflow;

pub use config::{DooiConfig, default_exclude, default_include};
pub use copy::{
    ConflictMode, CopyAction, CopyPlan, CopyResult, InstallOptions, InstallOutcome, execute,
    install, plan,
};
pub use edit::{
    EditChange, EditOptions, EditPlan, EditPreview, EditResult, SkippedFile, TextReplacement,
    apply_edit_plan, edit_content, find_files_to_edit,
};
pub use error::{DooiError, ErrorCode, Result};
pub use fetch::{
    BatchFetchResult, DooiClient, FetchRequest, ListResult, RawOutput, StageSummary,
    StagingArtifact, read_stage_meta, remove_stage, resolve_uses,
};
pub use guard::{
    ensure_writable_directory, is_safe_path, resolve_within, validate_glob_patterns,
    validate_path_within,
};
pub use mapping::{PathMapping, PathStrategy, resolve_mapping};
pub use matcher::{FileInfo, FileMatcher, match_files, require_matches};
pub use parse::{CatalogItem, ComponentMeta, ItemKind, parse_component_meta, parse_list_output};
pub use pm::{
    InstallRequest, InstallResult, PackageManager, PackageManagerInfo, PackageManifest,
    detect_package_manager, install_all, install_packages, parse_package_spec, read_manifest,
    resolve_package_manager, validate_package_names,
};
pub use runner::{CommandOutput, CommandRunner, Invocation, ProcessRunner, ScriptedRunner};
pub use workflow::{
    DepsStep, FetchStep, InstallStep, StepRecord, WorkflowOptions, WorkflowResult, WorkflowSteps,
    WorkflowSummary, brand_edit_plan, execute_workflow, validate_workflow_options,
};

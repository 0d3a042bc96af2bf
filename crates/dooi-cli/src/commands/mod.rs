use std::path::PathBuf;

use dooi::{
    CatalogItem, ComponentMeta, EditResult, InstallOutcome, InstallResult, StageSummary,
    WorkflowResult,
};
use serde::Serialize;

use crate::error::ExitStatus;

pub mod apply;
pub mod deps;
pub mod edit;
pub mod fetch;
pub mod install;
pub mod list;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResult {
    Catalog {
        items: Vec<CatalogItem>,
    },
    Fetched {
        id: String,
        stage_dir: PathBuf,
        files: Vec<String>,
        meta: ComponentMeta,
    },
    FetchedBatch {
        stages: Vec<StageSummary>,
    },
    Installed {
        stage_dir: PathBuf,
        dest_root: PathBuf,
        outcome: InstallOutcome,
    },
    Edited {
        dest_root: PathBuf,
        dry_run: bool,
        result: EditResult,
    },
    Dependencies {
        stdout_tail: String,
        result: InstallResult,
    },
    Applied {
        id: String,
        dry_run: bool,
        result: WorkflowResult,
    },
}

impl CommandResult {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            CommandResult::Dependencies { result, .. } if !result.success => ExitStatus::Data,
            CommandResult::Applied { result, .. } if !result.success => ExitStatus::Data,
            _ => ExitStatus::Ok,
        }
    }
}

use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;

use dooi::{CatalogItem, EditResult, InstallOutcome, ItemKind, WorkflowResult};

use crate::commands::CommandResult;
use crate::error::CliError;

pub enum OutputFormat {
    Text,
    Json,
}

/// Prints `result` in the requested format and maps it to an exit code.
pub fn emit_result(result: CommandResult, format: OutputFormat) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => print_text(&result),
        OutputFormat::Json => print_json(&result)?,
    };
    Ok(ExitCode::from(result.exit_status().code()))
}

fn print_text(result: &CommandResult) {
    match result {
        CommandResult::Catalog { items } => print_catalog(items),
        CommandResult::Fetched {
            id,
            stage_dir,
            files,
            meta,
        } => {
            println!("Staged {id} at {}", stage_dir.display());
            if !meta.title.is_empty() {
                println!("  Title: {}", meta.title);
            }
            print_list("Files", files);
            print_list("Dependencies", &meta.dependencies);
            print_list("Peer dependencies", &meta.peer_dependencies);
            print_list("Uses", &meta.uses);
        }
        CommandResult::FetchedBatch { stages } => {
            println!("Staged {} artifact(s):", stages.len());
            for stage in stages {
                println!(
                    "  - {} at {} ({} file(s))",
                    stage.id,
                    stage.stage_dir.display(),
                    stage.files.len()
                );
            }
        }
        CommandResult::Installed {
            stage_dir,
            dest_root,
            outcome,
        } => print_install(stage_dir, dest_root, outcome),
        CommandResult::Edited {
            dest_root,
            dry_run,
            result,
        } => print_edit(dest_root, *dry_run, result),
        CommandResult::Dependencies {
            stdout_tail,
            result,
        } => {
            let line = std::iter::once(result.command.as_str())
                .chain(result.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            if result.success {
                println!("Ran `{line}`");
            } else {
                println!("`{line}` failed (exit code {})", result.exit_code);
            }
            print_list("Installed", &result.installed_packages);
            for error in &result.errors {
                println!("  ! {error}");
            }
            if !stdout_tail.trim().is_empty() {
                println!("  Output:");
                for output in stdout_tail.lines() {
                    println!("    {output}");
                }
            }
        }
        CommandResult::Applied {
            id,
            dry_run,
            result,
        } => print_workflow(id, *dry_run, result),
    }
}

fn print_json(result: &CommandResult) -> Result<(), CliError> {
    let payload = serde_json::to_string(result)?;
    println!("{payload}");
    Ok(())
}

fn print_catalog(items: &[CatalogItem]) {
    let mut components: BTreeMap<&str, Vec<&CatalogItem>> = BTreeMap::new();
    let mut templates = Vec::new();
    for item in items {
        match item.kind {
            ItemKind::Component => components
                .entry(item.category.as_deref().unwrap_or("Other"))
                .or_default()
                .push(item),
            ItemKind::Template => templates.push(item),
        }
    }

    let component_count: usize = components.values().map(Vec::len).sum();
    println!("Components ({component_count}):");
    for (category, entries) in &components {
        println!("  {category}:");
        for item in entries {
            println!("    - {}: {}", item.id, item.description);
            if let Some(tags) = &item.tags {
                println!("      tags: {}", tags.join(", "));
            }
        }
    }
    println!("Templates ({}):", templates.len());
    for item in templates {
        println!("  - {}: {}", item.id, item.description);
    }
}

fn print_install(stage_dir: &Path, dest_root: &Path, outcome: &InstallOutcome) {
    let verb = if outcome.dry_run { "Would copy" } else { "Copied" };
    println!(
        "{verb} {} file(s) from {} into {}",
        outcome.result.total(),
        stage_dir.display(),
        dest_root.display()
    );
    for (label, paths) in [
        ("installed", &outcome.result.installed),
        ("skipped", &outcome.result.skipped),
        ("overwritten", &outcome.result.overwritten),
        ("renamed", &outcome.result.renamed),
    ] {
        for path in paths {
            println!("  [{label}] {}", relative(dest_root, path));
        }
    }
}

fn print_edit(dest_root: &Path, dry_run: bool, result: &EditResult) {
    let verb = if dry_run { "Would change" } else { "Changed" };
    println!(
        "{verb} {} file(s) under {} ({} replacement(s))",
        result.changed_files.len(),
        dest_root.display(),
        result.changes.len()
    );
    for file in &result.changed_files {
        println!("  - {file}");
    }
    for skipped in &result.skipped {
        println!("  [skipped] {}: {}", skipped.file, skipped.reason);
    }
    for preview in result.previews.iter().flatten() {
        println!("  @@ {}:{}", preview.file, preview.line);
        for change in &preview.changes {
            println!("    - {}", change.old_text);
            println!("    + {}", change.new_text);
        }
    }
}

fn print_workflow(id: &str, dry_run: bool, result: &WorkflowResult) {
    let summary = &result.summary;
    let status = if result.success { "OK" } else { "FAIL" };
    let mode = if dry_run { " (dry run)" } else { "" };
    println!(
        "Apply {id}{mode}: {status} ({}/{} step(s) succeeded)",
        summary.successful_steps, summary.total_steps
    );

    let steps = &result.steps;
    if let Some(fetch) = &steps.fetch {
        match fetch.output() {
            Some(out) => println!("  [ok] fetch: staged {} file(s)", out.files.len()),
            None => println!("  [err] fetch"),
        }
    }
    if let Some(install) = &steps.install {
        match install.output() {
            Some(out) => println!("  [ok] install: {} file(s) copied", out.result.total()),
            None => println!("  [err] install"),
        }
    }
    if let Some(edit) = &steps.text_edit {
        match edit.output() {
            Some(out) => println!("  [ok] text edit: {} file(s) changed", out.changed_files.len()),
            None => println!("  [err] text edit"),
        }
    }
    if let Some(deps) = &steps.install_deps {
        match deps.output() {
            Some(out) => println!(
                "  [ok] dependencies ({}): {}",
                out.pm,
                out.installed
                    .iter()
                    .chain(&out.peer_installed)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            None => println!("  [err] dependencies"),
        }
    }
    for error in &summary.errors {
        println!("  ! {error}");
    }
}

fn print_list(label: &str, values: &[String]) {
    if !values.is_empty() {
        println!("  {label}: {}", values.join(", "));
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dooi::{EditOptions, EditPlan, TextReplacement};

use crate::commands::CommandResult;
use crate::error::CliError;
use crate::util;

pub fn command() -> Command {
    Command::new("edit")
        .about("Apply literal or regex replacements to files inside a project")
        .arg(
            Arg::new("dest")
                .value_name("DEST_ROOT")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Project root; every edited file must live inside it"),
        )
        .arg(
            Arg::new("include")
                .long("include")
                .value_name("GLOB")
                .required(true)
                .action(ArgAction::Append)
                .help("Files to edit, relative to DEST_ROOT (repeatable)"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .value_name("GLOB")
                .action(ArgAction::Append)
                .help("Files to leave alone (repeatable)"),
        )
        .arg(
            Arg::new("replace")
                .long("replace")
                .num_args(2)
                .value_names(["FIND", "REPLACE"])
                .action(ArgAction::Append)
                .help("Replace every literal occurrence of FIND (applied first, in order)"),
        )
        .arg(
            Arg::new("regex")
                .long("regex")
                .num_args(2)
                .value_names(["PATTERN", "REPLACE"])
                .action(ArgAction::Append)
                .help("Replace regex matches; REPLACE may use $1 or ${name}"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Fail without writing if more than N files would change"),
        )
        .arg(
            Arg::new("context")
                .long("context")
                .value_name("LINES")
                .value_parser(value_parser!(usize))
                .help("Lines of context around each preview"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Preview the changes without writing"),
        )
}

pub fn run(matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let dest_root = util::absolute(util::required_path(matches, "dest")?)?;

    let mut replacements = pairs(matches, "replace", TextReplacement::literal);
    replacements.extend(pairs(matches, "regex", TextReplacement::regex));
    if replacements.is_empty() {
        return Err(CliError::usage(
            "at least one --replace or --regex pair is required",
        ));
    }

    let mut options = EditOptions {
        dry_run: matches.get_flag("dry-run"),
        limit_changed_files: matches.get_one::<usize>("limit").copied(),
        ..EditOptions::default()
    };
    if let Some(lines) = matches.get_one::<usize>("context") {
        options.preview_context_lines = *lines;
    }

    let plan = EditPlan {
        include: util::strings(matches, "include"),
        exclude: util::strings(matches, "exclude"),
        replacements,
        options,
    };
    let result = dooi::apply_edit_plan(&dest_root, &plan)?;

    Ok(CommandResult::Edited {
        dest_root,
        dry_run: plan.options.dry_run,
        result,
    })
}

fn pairs(
    matches: &ArgMatches,
    id: &str,
    build: fn(String, String) -> TextReplacement,
) -> Vec<TextReplacement> {
    let Some(occurrences) = matches.get_occurrences::<String>(id) else {
        return Vec::new();
    };
    occurrences
        .filter_map(|mut values| {
            let find = values.next()?.clone();
            let replace = values.next()?.clone();
            Some(build(find, replace))
        })
        .collect()
}

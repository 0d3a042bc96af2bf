use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dooi::{ConflictMode, InstallOptions};

use crate::commands::CommandResult;
use crate::error::CliError;
use crate::util;

pub fn command() -> Command {
    Command::new("install")
        .about("Copy files from a staging directory into a project")
        .arg(
            Arg::new("stage")
                .value_name("STAGE_DIR")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory produced by `dooi fetch`"),
        )
        .arg(
            Arg::new("dest")
                .long("dest")
                .value_name("PATH")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Project root receiving the files"),
        )
        .arg(
            Arg::new("strategy")
                .long("strategy")
                .value_name("NAME")
                .help("Path layout preset: next-app or vite-react"),
        )
        .arg(
            Arg::new("map")
                .long("map")
                .value_name("FROM=TO")
                .action(ArgAction::Append)
                .help("Map a staged path prefix to a destination prefix (repeatable)"),
        )
        .arg(
            Arg::new("include")
                .long("include")
                .value_name("GLOB")
                .action(ArgAction::Append)
                .help("Only copy files matching these globs (defaults to source and asset files)"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .value_name("GLOB")
                .action(ArgAction::Append)
                .help("Skip files matching these globs"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_parser(["skip", "overwrite", "rename"])
                .default_value("skip")
                .help("What to do when a destination file already exists"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Report the planned copies without writing anything"),
        )
}

pub fn run(matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let stage_dir = util::absolute(util::required_path(matches, "stage")?)?;
    let dest_root = util::absolute(util::required_path(matches, "dest")?)?;

    let mut options = InstallOptions::new(&stage_dir, &dest_root);
    options.path_strategy = util::path_strategy(matches)?;
    options.path_map = util::path_map(matches)?;
    options.include = matches.contains_id("include").then(|| util::strings(matches, "include"));
    options.exclude = matches.contains_id("exclude").then(|| util::strings(matches, "exclude"));
    options.mode = conflict_mode(matches);
    options.dry_run = matches.get_flag("dry-run");

    let outcome = dooi::install(&options)?;
    Ok(CommandResult::Installed {
        stage_dir,
        dest_root,
        outcome,
    })
}

fn conflict_mode(matches: &ArgMatches) -> ConflictMode {
    match matches.get_one::<String>("mode").map(String::as_str) {
        Some("overwrite") => ConflictMode::Overwrite,
        Some("rename") => ConflictMode::Rename,
        _ => ConflictMode::Skip,
    }
}

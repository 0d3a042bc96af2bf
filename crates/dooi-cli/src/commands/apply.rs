use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dooi::WorkflowOptions;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;
use crate::util;

pub fn command() -> Command {
    Command::new("apply")
        .about("Fetch a component or template, install it, rebrand it, and add its dependencies")
        .arg(
            Arg::new("id")
                .value_name("ID")
                .required(true)
                .help("Component or template id"),
        )
        .arg(
            Arg::new("dest")
                .long("dest")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .help("Project root receiving the files"),
        )
        .arg(
            Arg::new("brand")
                .long("brand")
                .value_name("NAME")
                .help("Replace the stock brand name in installed files"),
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
            Arg::new("no-deps")
                .long("no-deps")
                .action(ArgAction::SetTrue)
                .help("Skip installing declared dependencies"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Plan every step without writing files or running the package manager"),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let id = matches
        .get_one::<String>("id")
        .cloned()
        .ok_or_else(|| CliError::usage("missing <ID>"))?;
    let dest_root = util::absolute(util::required_path(matches, "dest")?)?;

    let mut options = WorkflowOptions::new(id.as_str(), dest_root);
    options.brand = matches.get_one::<String>("brand").cloned();
    options.path_strategy = util::path_strategy(matches)?.map(|strategy| strategy.to_string());
    options.path_map = util::path_map(matches)?;
    options.auto_deps = !matches.get_flag("no-deps");
    options.dry_run = matches.get_flag("dry-run");

    let result = session.block_on(dooi::execute_workflow(&session.client, &options))?;
    Ok(CommandResult::Applied {
        id,
        dry_run: options.dry_run,
        result,
    })
}

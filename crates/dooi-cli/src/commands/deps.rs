use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dooi::{InstallRequest, PackageManager};

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;
use crate::util;

pub fn command() -> Command {
    Command::new("deps")
        .about("Install npm packages with the project's package manager")
        .arg(
            Arg::new("packages")
                .value_name("PACKAGE")
                .action(ArgAction::Append)
                .help("Packages to add (name or name@version); omit to install the lock file"),
        )
        .arg(
            Arg::new("cwd")
                .long("cwd")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .help("Project directory containing package.json"),
        )
        .arg(
            Arg::new("pm")
                .long("pm")
                .value_parser(["npm", "yarn", "pnpm"])
                .help("Package manager; detected from the lock file when omitted"),
        )
        .arg(
            Arg::new("dev")
                .long("dev")
                .action(ArgAction::SetTrue)
                .help("Save as development dependencies"),
        )
        .arg(
            Arg::new("peer")
                .long("peer")
                .action(ArgAction::SetTrue)
                .help("Save as peer dependencies"),
        )
        .arg(
            Arg::new("flag")
                .long("flag")
                .value_name("FLAG")
                .allow_hyphen_values(true)
                .action(ArgAction::Append)
                .help("Extra flag passed through to the package manager (repeatable)"),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let cwd = util::absolute(util::required_path(matches, "cwd")?)?;
    let packages = util::strings(matches, "packages");

    let mut request = InstallRequest::new(cwd, packages);
    request.pm = matches
        .get_one::<String>("pm")
        .map(|raw| raw.parse::<PackageManager>())
        .transpose()?;
    request.flags = util::strings(matches, "flag");
    request.dev = matches.get_flag("dev");
    request.peer = matches.get_flag("peer");
    request.timeout = session.config().timeout;

    let runner = session.client.runner();
    let result = if request.packages.is_empty() {
        session.block_on(dooi::install_all(runner, &request))?
    } else {
        session.block_on(dooi::install_packages(runner, &request))?
    };

    Ok(CommandResult::Dependencies {
        stdout_tail: result.stdout_tail(),
        result,
    })
}

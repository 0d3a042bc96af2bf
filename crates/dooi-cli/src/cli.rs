use std::ffi::OsString;
use std::io;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use crate::commands;
use crate::context::CliSession;
use crate::error::CliError;
use crate::formatter::{OutputFormat, emit_result};
use crate::util::Verbosity;

const NAME: &str = "dooi";

pub fn run() -> ExitCode {
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses arguments, builds the session, and dispatches to a command. The returned
/// `ExitCode` follows `sysexits` so scripts can branch on the failure class.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let command = build_cli();
    let matches = command.try_get_matches_from(args)?;

    let verbosity = Verbosity {
        json: matches.get_flag("json"),
        verbose: matches.get_flag("verbose"),
    };
    init_tracing(verbosity.verbose);
    let output = if verbosity.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let cli_override = matches.get_one::<String>("cli").map(String::as_str);
    let session = CliSession::bootstrap(cli_override, verbosity)?;
    if session.verbosity.verbose {
        let config = session.config();
        tracing::info!(
            program = %config.program,
            args = ?config.program_args,
            stage_root = %config.stage_root.display(),
            timeout_ms = config.timeout.as_millis() as u64,
            "resolved dooi-ui invocation"
        );
    }

    let result = dispatch(&session, &matches)?;
    emit_result(result, output)
}

/// Logs go to stderr; `RUST_LOG` wins, then `LOG_LEVEL`, then `warn` (`debug` with `--verbose`).
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            std::env::var("LOG_LEVEL")
                .ok()
                .and_then(|level| EnvFilter::try_new(level.trim()).ok())
        })
        .unwrap_or_else(|| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Fetch, install, and adapt dooi-ui components and templates")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit a single JSON document instead of human-readable text."),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log the resolved dooi-ui invocation and every pipeline step to stderr."),
        )
        .arg(
            Arg::new("cli")
                .long("cli")
                .global(true)
                .value_name("COMMAND")
                .help("Command used to run dooi-ui, e.g. \"npx dooi-ui\" (default; env DOOI_CLI)."),
        )
        .subcommand_required(true)
        .subcommand(commands::list::command())
        .subcommand(commands::fetch::command())
        .subcommand(commands::install::command())
        .subcommand(commands::edit::command())
        .subcommand(commands::deps::command())
        .subcommand(commands::apply::command())
}

fn dispatch(
    session: &CliSession,
    matches: &ArgMatches,
) -> Result<commands::CommandResult, CliError> {
    match matches.subcommand() {
        Some(("list", sub)) => commands::list::run(session, sub),
        Some(("fetch", sub)) => commands::fetch::run(session, sub),
        Some(("install", sub)) => commands::install::run(sub),
        Some(("edit", sub)) => commands::edit::run(sub),
        Some(("deps", sub)) => commands::deps::run(session, sub),
        Some(("apply", sub)) => commands::apply::run(session, sub),
        _ => Err(CliError::usage("missing command")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        build_cli().debug_assert();
    }
}

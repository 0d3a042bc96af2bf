use clap::{Arg, ArgAction, ArgMatches, Command};
use dooi::FetchRequest;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;
use crate::util;

pub fn command() -> Command {
    Command::new("fetch")
        .about("Stage one or more components or templates into temporary directories")
        .arg(
            Arg::new("ids")
                .value_name("ID")
                .required(true)
                .action(ArgAction::Append)
                .help("Artifact ids, e.g. ui/button or landing-morphic"),
        )
        .arg(
            Arg::new("ref")
                .long("ref")
                .value_name("GIT_REF")
                .help("Git ref forwarded to dooi-ui (single id only)"),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let ids = util::strings(matches, "ids");
    let git_ref = matches.get_one::<String>("ref").cloned();

    if let [id] = ids.as_slice() {
        let mut request = FetchRequest::new(id.as_str());
        request.git_ref = git_ref;
        let artifact = session.block_on(session.client.fetch(&request))?;
        return Ok(CommandResult::Fetched {
            id: artifact.id,
            stage_dir: artifact.stage_dir,
            files: artifact.files,
            meta: artifact.meta,
        });
    }

    if git_ref.is_some() {
        return Err(CliError::usage("--ref can only be used when fetching a single id"));
    }
    let batch = session.block_on(session.client.fetch_batch(&ids))?;
    Ok(CommandResult::FetchedBatch {
        stages: batch.stages,
    })
}

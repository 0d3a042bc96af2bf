use clap::{Arg, ArgMatches, Command};
use dooi::ItemKind;

use crate::commands::CommandResult;
use crate::context::CliSession;
use crate::error::CliError;

pub fn command() -> Command {
    Command::new("list")
        .about("List the components and templates published by dooi-ui")
        .arg(
            Arg::new("type")
                .long("type")
                .value_parser(["component", "template"])
                .help("Only show one kind of item"),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .value_name("NAME")
                .help("Only show components from this category (case-insensitive)"),
        )
}

pub fn run(session: &CliSession, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let listing = session.block_on(session.client.list())?;

    let kind = matches.get_one::<String>("type").map(|raw| match raw.as_str() {
        "template" => ItemKind::Template,
        _ => ItemKind::Component,
    });
    let category = matches.get_one::<String>("category");

    let items = listing
        .items
        .into_iter()
        .filter(|item| kind.is_none_or(|kind| item.kind == kind))
        .filter(|item| match category {
            Some(wanted) => item
                .category
                .as_deref()
                .is_some_and(|actual| actual.eq_ignore_ascii_case(wanted)),
            None => true,
        })
        .collect();

    Ok(CommandResult::Catalog { items })
}

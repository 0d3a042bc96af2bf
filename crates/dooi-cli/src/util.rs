use std::path::{Path, PathBuf};

use clap::ArgMatches;
use dooi::{PathMapping, PathStrategy};

use crate::error::CliError;

#[derive(Clone, Copy, Debug, Default)]
pub struct Verbosity {
    pub json: bool,
    pub verbose: bool,
}

/// Collects repeated `--map FROM=TO` values into a mapping.
pub fn path_map(matches: &ArgMatches) -> Result<Option<PathMapping>, CliError> {
    let Some(values) = matches.get_many::<String>("map") else {
        return Ok(None);
    };

    let mut mapping = PathMapping::new();
    for value in values {
        let (from, to) = value.split_once('=').ok_or_else(|| {
            CliError::usage(format!("path map entry '{value}' must look like FROM=TO"))
        })?;
        mapping.insert(from.trim(), to.trim());
    }
    Ok(Some(mapping))
}

pub fn path_strategy(matches: &ArgMatches) -> Result<Option<PathStrategy>, CliError> {
    matches
        .get_one::<String>("strategy")
        .map(|raw| raw.parse::<PathStrategy>().map_err(CliError::from))
        .transpose()
}

pub fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

pub fn required_path<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a PathBuf, CliError> {
    matches
        .get_one::<PathBuf>(id)
        .ok_or_else(|| CliError::usage(format!("missing <{id}>")))
}

/// Relative paths are resolved against the current directory so results print absolute.
pub fn absolute(path: &Path) -> Result<PathBuf, CliError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

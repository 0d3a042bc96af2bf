use std::fmt;
use std::process::ExitCode;

use clap::error::ErrorKind as ClapErrorKind;
use dooi::{DooiError, ErrorCode};

const EX_OK: u8 = 0;
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;
const EX_OSERR: u8 = 71;
const EX_CONFIG: u8 = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    Usage,
    Data,
    Io,
    Config,
    Software,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Ok => EX_OK,
            ExitStatus::Usage => EX_USAGE,
            ExitStatus::Data => EX_DATAERR,
            ExitStatus::Io => EX_OSERR,
            ExitStatus::Config => EX_CONFIG,
            ExitStatus::Software => EX_SOFTWARE,
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    message: String,
    hint: Option<String>,
    status: ExitStatus,
}

impl CliError {
    pub fn new(message: impl Into<String>, status: ExitStatus) -> Self {
        Self {
            message: message.into(),
            hint: None,
            status,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(message, ExitStatus::Usage)
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status.code())
    }

    pub fn print(&self) {
        if !self.message.is_empty() {
            eprintln!("{}", self.message);
        }
        if let Some(hint) = &self.hint {
            eprintln!("  hint: {hint}");
        }
    }
}

/// Exit status for a core error code.
fn status_for(code: ErrorCode) -> ExitStatus {
    match code {
        ErrorCode::InvalidInput
        | ErrorCode::PathTraversal
        | ErrorCode::InvalidPathMap
        | ErrorCode::InvalidRegex
        | ErrorCode::InvalidReplacement => ExitStatus::Usage,
        ErrorCode::ListUnavailable
        | ErrorCode::FetchFailed
        | ErrorCode::ParseMeta
        | ErrorCode::StageMissing
        | ErrorCode::StageExpired
        | ErrorCode::NoMatches
        | ErrorCode::ParseFailed
        | ErrorCode::TooManyChanges
        | ErrorCode::PmExit
        | ErrorCode::InstallFailed => ExitStatus::Data,
        ErrorCode::CliNotFound | ErrorCode::PmNotFound => ExitStatus::Config,
        ErrorCode::StageCreationFailed
        | ErrorCode::DestNotWritable
        | ErrorCode::OperationTimeout
        | ErrorCode::PermissionDenied => ExitStatus::Io,
        ErrorCode::InternalError => ExitStatus::Software,
    }
}

impl From<DooiError> for CliError {
    fn from(err: DooiError) -> Self {
        Self {
            message: format!("error[{}]: {}", err.code, err.message),
            hint: err.actionable.filter(|hint| !hint.is_empty()),
            status: status_for(err.code),
        }
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> Self {
        let status = match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => ExitStatus::Ok,
            _ => ExitStatus::Usage,
        };
        if status == ExitStatus::Ok {
            let _ = err.print();
            CliError::new(String::new(), status)
        } else {
            CliError::new(err.to_string(), status)
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::new(err.to_string(), ExitStatus::Io)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::new(err.to_string(), ExitStatus::Software)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_carry_code_and_guidance() {
        let err = CliError::from(DooiError::new(ErrorCode::StageMissing));
        assert_eq!(err.status, ExitStatus::Data);
        assert!(err.message.starts_with("error[E_STAGE_MISSING]"));
        assert!(err.hint.is_some());

        let err = CliError::from(DooiError::invalid_input("bad"));
        assert_eq!(err.status.code(), 64);
    }
}

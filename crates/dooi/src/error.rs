use std::fmt;
use std::io;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Machine-readable error codes surfaced to MCP clients and CLI users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ErrorCode {
    #[serde(rename = "E_CLI_NOT_FOUND")]
    CliNotFound,
    #[serde(rename = "E_LIST_UNAVAILABLE")]
    ListUnavailable,
    #[serde(rename = "E_FETCH_FAILED")]
    FetchFailed,
    #[serde(rename = "E_PARSE_META")]
    ParseMeta,
    #[serde(rename = "E_STAGE_MISSING")]
    StageMissing,
    #[serde(rename = "E_STAGE_EXPIRED")]
    StageExpired,
    #[serde(rename = "E_STAGE_CREATION_FAILED")]
    StageCreationFailed,
    #[serde(rename = "E_NO_MATCHES")]
    NoMatches,
    #[serde(rename = "E_DEST_NOT_WRITABLE")]
    DestNotWritable,
    #[serde(rename = "E_PATH_TRAVERSAL")]
    PathTraversal,
    #[serde(rename = "E_INVALID_PATH_MAP")]
    InvalidPathMap,
    #[serde(rename = "E_INVALID_REPLACEMENT")]
    InvalidReplacement,
    #[serde(rename = "E_INVALID_REGEX")]
    InvalidRegex,
    #[serde(rename = "E_PARSE_FAILED")]
    ParseFailed,
    #[serde(rename = "E_TOO_MANY_CHANGES")]
    TooManyChanges,
    #[serde(rename = "E_PM_NOT_FOUND")]
    PmNotFound,
    #[serde(rename = "E_PM_EXIT")]
    PmExit,
    #[serde(rename = "E_INSTALL_FAILED")]
    InstallFailed,
    #[serde(rename = "E_INVALID_INPUT")]
    InvalidInput,
    #[serde(rename = "E_OPERATION_TIMEOUT")]
    OperationTimeout,
    #[serde(rename = "E_PERMISSION_DENIED")]
    PermissionDenied,
    #[serde(rename = "E_INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::CliNotFound => "E_CLI_NOT_FOUND",
            ErrorCode::ListUnavailable => "E_LIST_UNAVAILABLE",
            ErrorCode::FetchFailed => "E_FETCH_FAILED",
            ErrorCode::ParseMeta => "E_PARSE_META",
            ErrorCode::StageMissing => "E_STAGE_MISSING",
            ErrorCode::StageExpired => "E_STAGE_EXPIRED",
            ErrorCode::StageCreationFailed => "E_STAGE_CREATION_FAILED",
            ErrorCode::NoMatches => "E_NO_MATCHES",
            ErrorCode::DestNotWritable => "E_DEST_NOT_WRITABLE",
            ErrorCode::PathTraversal => "E_PATH_TRAVERSAL",
            ErrorCode::InvalidPathMap => "E_INVALID_PATH_MAP",
            ErrorCode::InvalidReplacement => "E_INVALID_REPLACEMENT",
            ErrorCode::InvalidRegex => "E_INVALID_REGEX",
            ErrorCode::ParseFailed => "E_PARSE_FAILED",
            ErrorCode::TooManyChanges => "E_TOO_MANY_CHANGES",
            ErrorCode::PmNotFound => "E_PM_NOT_FOUND",
            ErrorCode::PmExit => "E_PM_EXIT",
            ErrorCode::InstallFailed => "E_INSTALL_FAILED",
            ErrorCode::InvalidInput => "E_INVALID_INPUT",
            ErrorCode::OperationTimeout => "E_OPERATION_TIMEOUT",
            ErrorCode::PermissionDenied => "E_PERMISSION_DENIED",
            ErrorCode::InternalError => "E_INTERNAL_ERROR",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorCode::CliNotFound => {
                "dooi-ui CLI not found. Please install with: npm install -g dooi-ui"
            }
            ErrorCode::ListUnavailable => "Unable to list available templates/components",
            ErrorCode::FetchFailed => "Failed to fetch template/component",
            ErrorCode::ParseMeta => "Failed to parse metadata from CLI output",
            ErrorCode::StageMissing => "Staging directory not found",
            ErrorCode::StageExpired => "Staging directory has expired",
            ErrorCode::StageCreationFailed => "Failed to create staging directory",
            ErrorCode::NoMatches => "No files match the specified criteria",
            ErrorCode::DestNotWritable => "Destination directory is not writable",
            ErrorCode::PathTraversal => "Path traversal attempt detected",
            ErrorCode::InvalidPathMap => "Invalid path mapping configuration",
            ErrorCode::InvalidReplacement => "Invalid text replacement pattern",
            ErrorCode::InvalidRegex => "Invalid regular expression",
            ErrorCode::ParseFailed => "Failed to parse file content",
            ErrorCode::TooManyChanges => "Too many files would be changed",
            ErrorCode::PmNotFound => "Package manager not found",
            ErrorCode::PmExit => "Package manager execution failed",
            ErrorCode::InstallFailed => "Package installation failed",
            ErrorCode::InvalidInput => "Invalid input parameters",
            ErrorCode::OperationTimeout => "Operation timed out",
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::InternalError => "Internal server error",
        }
    }

    /// Guidance shown next to the message so a user (or assistant) knows what to try next.
    pub fn guidance(self) -> &'static str {
        match self {
            ErrorCode::CliNotFound => "Run: npm install -g dooi-ui or use npx dooi-ui instead",
            ErrorCode::ListUnavailable => "Check if dooi-ui is properly installed and accessible",
            ErrorCode::FetchFailed => {
                "Verify the component/template ID exists and network connectivity"
            }
            ErrorCode::ParseMeta => {
                "This is a parsing issue; raw CLI output is included for debugging"
            }
            ErrorCode::StageMissing => "Ensure the staging directory path is correct",
            ErrorCode::StageExpired => {
                "Re-fetch the component/template to get a new staging directory"
            }
            ErrorCode::StageCreationFailed => "Check disk space and write permissions",
            ErrorCode::NoMatches => "Adjust include/exclude patterns or check file paths",
            ErrorCode::DestNotWritable => "Check write permissions for the destination directory",
            ErrorCode::PathTraversal => "Use relative paths within the allowed scope",
            ErrorCode::InvalidPathMap => "Ensure all paths in the mapping are valid and relative",
            ErrorCode::InvalidReplacement => {
                "Use valid string patterns or escape special characters"
            }
            ErrorCode::InvalidRegex => "Check regex syntax and escape special characters properly",
            ErrorCode::ParseFailed => "File may have syntax errors; check the file content",
            ErrorCode::TooManyChanges => "Use more specific patterns or increase the limit",
            ErrorCode::PmNotFound => "Install npm, yarn, or pnpm package manager",
            ErrorCode::PmExit => "Check package names and network connectivity",
            ErrorCode::InstallFailed => "Verify package names and repository access",
            ErrorCode::InvalidInput => "Check input parameters against the tool input schema",
            ErrorCode::OperationTimeout => "Increase timeout or check system performance",
            ErrorCode::PermissionDenied => "Check file and directory permissions",
            ErrorCode::InternalError => "This is a bug; please report with details",
        }
    }

    /// Codes caused by caller input rather than by the environment.
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidInput
                | ErrorCode::PathTraversal
                | ErrorCode::InvalidPathMap
                | ErrorCode::InvalidRegex
                | ErrorCode::InvalidReplacement
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error shared across the dooi pipeline stages.
///
/// Every error carries a stable [`ErrorCode`], a human-readable message, optional structured
/// details, and actionable guidance.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct DooiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actionable: Option<String>,
}

pub type Result<T, E = DooiError> = std::result::Result<T, E>;

impl DooiError {
    /// Builds an error with the code's default message and guidance.
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Map::new(),
            actionable: Some(code.guidance().to_string()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, message)
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn context<T: fmt::Display>(mut self, ctx: T) -> Self {
        self.message = format!("{ctx}: {}", self.message);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<io::Error> for DooiError {
    fn from(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            io::ErrorKind::TimedOut => ErrorCode::OperationTimeout,
            _ => ErrorCode::InternalError,
        };
        DooiError::with_message(code, err.to_string())
    }
}

impl From<serde_json::Error> for DooiError {
    fn from(err: serde_json::Error) -> Self {
        DooiError::internal(format!("serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_default_message_and_guidance() {
        let err = DooiError::new(ErrorCode::NoMatches);
        assert_eq!(err.message, "No files match the specified criteria");
        assert_eq!(
            err.actionable.as_deref(),
            Some("Adjust include/exclude patterns or check file paths")
        );
    }

    #[test]
    fn serializes_stable_code_strings() {
        let err = DooiError::new(ErrorCode::PathTraversal).detail("path", "../etc");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "E_PATH_TRAVERSAL");
        assert_eq!(value["details"]["path"], "../etc");
    }

    #[test]
    fn permission_denied_io_maps_to_permission_code() {
        let err: DooiError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
    }
}

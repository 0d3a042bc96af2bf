use dooi::DooiError;
use rmcp::model::ErrorData;
use serde_json::json;

pub type McpError = ErrorData;

/// Validation failures become invalid params; everything else is an internal error.
/// The structured error travels in `data`.
pub fn to_mcp_error(err: DooiError) -> McpError {
    let data = json!({
        "code": err.code,
        "message": err.message,
        "details": err.details,
        "actionable": err.actionable,
    });
    if err.code.is_validation() {
        ErrorData::invalid_params(err.message, Some(data))
    } else {
        ErrorData::internal_error(err.message, Some(data))
    }
}

pub fn invalid_params(message: impl Into<String>) -> McpError {
    ErrorData::invalid_params(message.into(), None)
}

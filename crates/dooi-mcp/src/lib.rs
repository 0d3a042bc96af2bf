//! MCP adapter exposing the dooi pipeline over stdio.

mod error;
mod prompts;
mod resources;
mod server;
mod telemetry;
mod tools;

pub use crate::error::{McpError, invalid_params, to_mcp_error};
pub use crate::prompts::{
    ApplyComponentPromptArgs, ApplyTemplatePromptArgs, GettingStartedPromptArgs,
    SelectComponentPromptArgs, SelectTemplatePromptArgs,
};
pub use crate::resources::{ResourceBody, parse_resource_uri};
pub use crate::server::{DooiMcpServer, run_stdio_server};
pub use crate::telemetry::init_tracing;
pub use crate::tools::{
    FetchArgs, FetchBatchArgs, InstallArgs, InstallDepsArgs, InstallDepsOutput, ListArgs,
    ResolveUsesArgs, ResolveUsesOutput, TextEditArgs,
};

use rmcp::handler::server::{router::prompt::PromptRouter, tool::ToolRouter};
use rmcp::service::ServerInitializeError;
use rmcp::{service::ServiceExt, transport};

use dooi::{DooiClient, DooiConfig};

use crate::prompts::build_prompt_router;
use crate::tools::build_tool_router;

#[derive(Clone)]
pub struct DooiMcpServer {
    pub(crate) client: DooiClient,
    pub(crate) tool_router: ToolRouter<Self>,
    pub(crate) prompt_router: PromptRouter<Self>,
}

impl DooiMcpServer {
    pub fn new(config: DooiConfig) -> Self {
        Self::with_client(DooiClient::new(config))
    }

    /// Builds a server around an existing client, e.g. one backed by a scripted runner.
    pub fn with_client(client: DooiClient) -> Self {
        Self {
            client,
            tool_router: build_tool_router(),
            prompt_router: build_prompt_router(),
        }
    }

    pub fn client(&self) -> &DooiClient {
        &self.client
    }

    /// Start a stdio-based MCP server and wait until the transport closes.
    pub async fn run_stdio(self) -> Result<(), ServerInitializeError> {
        let service = self.serve(transport::io::stdio()).await?;

        // Hold the service open until the peer closes the transport.
        let _ = service.waiting().await;
        Ok(())
    }
}

/// Builds the server from `config` and runs it over stdio.
pub async fn run_stdio_server(config: DooiConfig) -> Result<(), ServerInitializeError> {
    tracing::info!(
        program = %config.program,
        stage_root = %config.stage_root.display(),
        "starting dooi-mcp"
    );
    DooiMcpServer::new(config).run_stdio().await
}

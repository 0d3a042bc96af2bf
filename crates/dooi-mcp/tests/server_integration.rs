use std::sync::Arc;

use dooi::{CommandOutput, DooiClient, DooiConfig, ScriptedRunner};
use dooi_mcp::DooiMcpServer;
use futures::channel::mpsc;
use rmcp::model::{
    ClientRequest, ListResourceTemplatesRequest, ReadResourceRequest, ReadResourceRequestParams,
    ResourceContents, ServerResult,
};
use rmcp::service::{RunningService, ServiceError};
use rmcp::{RoleClient, RoleServer, serve_client, serve_server};
use tempfile::TempDir;

const LIST_OUTPUT: &str = "\
📦 Components:
  UI:
    • ui/button: Animated button
      Tags: button, motion
    • ui/card: Glass card
🏗️ Templates:
  • landing-morphic: Landing page
";

const BUTTON_OUTPUT: &str = "\
Component: Button
npm install react clsx
Component Code:
export function Button() { return <button>Dooi</button>; }
";

struct TestServer {
    _stages: TempDir,
    _server: RunningService<RoleServer, DooiMcpServer>,
    client: RunningService<RoleClient, ()>,
}

impl TestServer {
    async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let stages = tempfile::tempdir()?;
        let runner = ScriptedRunner::new()
            .on("list", |_| {
                Ok(CommandOutput {
                    stdout: LIST_OUTPUT.into(),
                    ..CommandOutput::default()
                })
            })
            .on("get", |inv| {
                let id = inv.args.last().cloned().unwrap_or_default();
                if id == "ui/button" {
                    Ok(CommandOutput {
                        stdout: BUTTON_OUTPUT.into(),
                        ..CommandOutput::default()
                    })
                } else {
                    Ok(CommandOutput {
                        stderr: format!("Unknown component: {id}"),
                        exit_code: 1,
                        ..CommandOutput::default()
                    })
                }
            });
        let client = DooiClient::with_runner(
            Arc::new(runner),
            DooiConfig::default().with_stage_root(stages.path()),
        );
        let server = DooiMcpServer::with_client(client);

        // client Tx == server Rx, and server Tx == client Rx.
        let (client_to_server_tx, server_incoming_rx) =
            mpsc::unbounded::<rmcp::service::TxJsonRpcMessage<RoleClient>>();
        let (server_to_client_tx, client_incoming_rx) =
            mpsc::unbounded::<rmcp::service::TxJsonRpcMessage<RoleServer>>();

        let server_transport = (server_to_client_tx, server_incoming_rx);
        let client_transport = (client_to_server_tx, client_incoming_rx);

        let server_task = tokio::spawn(async move { serve_server(server, server_transport).await });
        let client_task = tokio::spawn(async move { serve_client((), client_transport).await });

        let running_server = server_task
            .await
            .map_err(|e| format!("server task join failed: {e}"))??;
        let client = client_task
            .await
            .map_err(|e| format!("client task join failed: {e}"))??;

        Ok(Self {
            _stages: stages,
            _server: running_server,
            client,
        })
    }

    async fn read_text_resource(&self, uri: &str) -> Result<(String, String), ServiceError> {
        let request = ReadResourceRequest::new(ReadResourceRequestParams {
            uri: uri.to_string(),
            meta: None,
        });
        let result = self
            .client
            .send_request(ClientRequest::ReadResourceRequest(request))
            .await?;

        match result {
            ServerResult::ReadResourceResult(r) => {
                let first = r
                    .contents
                    .into_iter()
                    .next()
                    .ok_or(ServiceError::UnexpectedResponse)?;
                match first {
                    ResourceContents::TextResourceContents {
                        mime_type, text, ..
                    } => Ok((mime_type.unwrap_or_default(), text)),
                    _ => Err(ServiceError::UnexpectedResponse),
                }
            }
            _ => Err(ServiceError::UnexpectedResponse),
        }
    }

    async fn list_templates(&self) -> Result<Vec<String>, ServiceError> {
        let result = self
            .client
            .send_request(ClientRequest::ListResourceTemplatesRequest(
                ListResourceTemplatesRequest::default(),
            ))
            .await?;

        match result {
            ServerResult::ListResourceTemplatesResult(r) => Ok(r
                .resource_templates
                .into_iter()
                .map(|t| t.raw.uri_template)
                .collect()),
            _ => Err(ServiceError::UnexpectedResponse),
        }
    }
}

#[tokio::test]
async fn templates_cover_components_and_templates() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start().await?;

    let uris = server.list_templates().await?;
    for expected in ["dooi://component/{id}", "dooi://template/{id}"] {
        assert!(uris.contains(&expected.to_string()), "missing {expected}");
    }
    Ok(())
}

#[tokio::test]
async fn catalog_entries_are_listed_as_resources() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start().await?;

    let resources = server.client.list_all_resources().await?;
    let uris: Vec<&str> = resources.iter().map(|r| r.raw.uri.as_str()).collect();
    assert_eq!(
        uris,
        vec![
            "dooi://component/ui/button",
            "dooi://component/ui/card",
            "dooi://template/landing-morphic",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn reading_a_component_returns_staged_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start().await?;

    let (mime, text) = server
        .read_text_resource("dooi://component/ui/button")
        .await?;
    assert_eq!(mime, "application/json");

    let value: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(value["id"], "ui/button");
    assert_eq!(value["type"], "component");
    assert_eq!(value["dependencies"], serde_json::json!(["react", "clsx"]));
    assert_eq!(value["files"], serde_json::json!(["components/ui/button.tsx"]));
    Ok(())
}

#[tokio::test]
async fn malformed_uris_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start().await?;

    let err = server
        .read_text_resource("dooi://widget/ui/button")
        .await
        .err()
        .ok_or("expected an error")?;
    match err {
        ServiceError::McpError(ed) => {
            assert!(ed.message.contains("dooi://component/<id>"), "{ed:?}");
        }
        other => return Err(format!("unexpected error: {other:?}").into()),
    }
    Ok(())
}

#[tokio::test]
async fn every_tool_and_prompt_is_advertised() -> Result<(), Box<dyn std::error::Error>> {
    let server = TestServer::start().await?;

    let tools = server.client.list_all_tools().await?;
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
    for expected in ["dooi.list", "dooi.install", "dooi.workflow.applyComponent"] {
        assert!(names.contains(&expected), "missing tool {expected}");
    }

    let prompts = server.client.list_all_prompts().await?;
    let names: Vec<&str> = prompts.iter().map(|p| p.name.as_str()).collect();
    assert!(names.contains(&"getting-started"), "{names:?}");
    Ok(())
}

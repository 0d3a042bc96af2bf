use std::path::PathBuf;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    GetPromptRequestParams, GetPromptResult, ListPromptsResult, PaginatedRequestParams,
    ListResourceTemplatesResult, ListResourcesResult, PaginatedRequestParam, RawResource,
    RawResourceTemplate, ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
    ResourceTemplate, ServerCapabilities, ServerInfo,
};
use rmcp::schemars::JsonSchema;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{prompt_handler, tool_handler};
use serde::Serialize;

use dooi::{CatalogItem, FetchRequest, ItemKind, StagingArtifact};

use crate::error::{McpError, invalid_params, to_mcp_error};
use crate::server::DooiMcpServer;

const SCHEME: &str = "dooi://";
const JSON_MIME: &str = "application/json";

/// JSON body returned when a `dooi://{type}/{id}` resource is read.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBody {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub peer_dependencies: Vec<String>,
    pub uses: Vec<String>,
    pub files: Vec<String>,
    pub stage_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_block: Option<String>,
}

impl ResourceBody {
    fn new(kind: ItemKind, artifact: StagingArtifact) -> Self {
        let meta = artifact.meta;
        Self {
            id: artifact.id,
            kind,
            title: meta.title,
            description: meta.description,
            dependencies: meta.dependencies,
            peer_dependencies: meta.peer_dependencies,
            uses: meta.uses,
            files: artifact.files,
            stage_dir: artifact.stage_dir,
            code_block: meta.code_block,
        }
    }
}

/// Splits `dooi://{type}/{id}`; ids may contain further slashes.
pub fn parse_resource_uri(uri: &str) -> Option<(ItemKind, &str)> {
    let rest = uri.strip_prefix(SCHEME)?;
    let (kind, id) = rest.split_once('/')?;
    let kind = match kind {
        "component" => ItemKind::Component,
        "template" => ItemKind::Template,
        _ => return None,
    };
    (!id.trim().is_empty()).then_some((kind, id))
}

fn resource_uri(item: &CatalogItem) -> String {
    format!("{SCHEME}{}/{}", item.kind.as_str(), item.id)
}

pub(crate) fn resource_for_item(item: &CatalogItem) -> Resource {
    Resource {
        raw: RawResource {
            uri: resource_uri(item),
            name: format!("{}:{}", item.kind.as_str(), item.id),
            title: Some(item.title.clone()),
            description: Some(item.description.clone()),
            mime_type: Some(JSON_MIME.to_string()),
            size: None,
            icons: None,
            meta: None,
        },
        annotations: None,
    }
}

pub(crate) fn resource_templates() -> Vec<ResourceTemplate> {
    vec![
        ResourceTemplate {
            raw: RawResourceTemplate {
                uri_template: "dooi://component/{id}".to_string(),
                name: "dooi-component".to_string(),
                title: Some("dooi-ui component".to_string()),
                description: Some(
                    "Fetch a component and return its metadata and staged files".to_string(),
                ),
                mime_type: Some(JSON_MIME.to_string()),
                icons: None,
            },
            annotations: None,
        },
        ResourceTemplate {
            raw: RawResourceTemplate {
                uri_template: "dooi://template/{id}".to_string(),
                name: "dooi-template".to_string(),
                title: Some("dooi-ui template".to_string()),
                description: Some(
                    "Fetch a template and return its metadata, used components, and staged files"
                        .to_string(),
                ),
                mime_type: Some(JSON_MIME.to_string()),
                icons: None,
            },
            annotations: None,
        },
    ]
}

impl DooiMcpServer {
    pub(crate) async fn catalog_resources(&self) -> Vec<Resource> {
        match self.client.list().await {
            Ok(list) => list
                .items
                .iter()
                .filter(|item| !item.is_placeholder())
                .map(resource_for_item)
                .collect(),
            Err(err) => {
                tracing::warn!(code = %err.code, error = %err, "listing resources failed");
                Vec::new()
            }
        }
    }

    pub(crate) async fn read_resource_contents(
        &self,
        uri: &str,
    ) -> Result<ResourceContents, McpError> {
        let (kind, id) = parse_resource_uri(uri).ok_or_else(|| {
            invalid_params(format!(
                "malformed resource uri {uri}: \
                 expected dooi://component/<id> or dooi://template/<id>"
            ))
        })?;

        let artifact = self
            .client
            .fetch(&FetchRequest::new(id))
            .await
            .map_err(to_mcp_error)?;
        let body = serde_json::to_string_pretty(&ResourceBody::new(kind, artifact))
            .map_err(|err| to_mcp_error(err.into()))?;

        Ok(ResourceContents::TextResourceContents {
            uri: uri.to_string(),
            mime_type: Some(JSON_MIME.to_string()),
            text: body,
            meta: None,
        })
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for DooiMcpServer {
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(
            self.catalog_resources().await,
        ))
    }

    fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourceTemplatesResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListResourceTemplatesResult::with_all_items(
            resource_templates(),
        )))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let contents = self.read_resource_contents(&request.uri).await?;
        Ok(ReadResourceResult {
            contents: vec![contents],
        })
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            instructions: Some(
                "Start with the getting-started prompt, or call dooi.list to browse the catalog."
                    .to_string(),
            ),
            ..ServerInfo::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_uris_round_trip_through_the_parser() {
        assert_eq!(
            parse_resource_uri("dooi://component/ui/button"),
            Some((ItemKind::Component, "ui/button"))
        );
        assert_eq!(
            parse_resource_uri("dooi://template/landing-morphic"),
            Some((ItemKind::Template, "landing-morphic"))
        );
        assert_eq!(parse_resource_uri("dooi://widget/x"), None);
        assert_eq!(parse_resource_uri("dooi://component/"), None);
        assert_eq!(parse_resource_uri("spec://component/x"), None);
    }

    #[test]
    fn catalog_items_become_json_resources() {
        let item = CatalogItem {
            id: "ui/button".into(),
            kind: ItemKind::Component,
            title: "ui/button".into(),
            description: "Button".into(),
            tags: None,
            category: None,
        };
        let resource = resource_for_item(&item);
        assert_eq!(resource.raw.uri, "dooi://component/ui/button");
        assert_eq!(resource.raw.name, "component:ui/button");
        assert_eq!(resource.raw.mime_type.as_deref(), Some(JSON_MIME));
    }
}

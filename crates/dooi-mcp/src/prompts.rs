use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use rmcp::handler::server::router::prompt::PromptRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{PromptMessage, PromptMessageRole};
use rmcp::schemars::JsonSchema;
use rmcp::{prompt, prompt_router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use dooi::{CatalogItem, DooiError, ItemKind, PathStrategy};

use crate::error::{McpError, invalid_params, to_mcp_error};
use crate::server::DooiMcpServer;

pub(crate) fn build_prompt_router() -> PromptRouter<DooiMcpServer> {
    DooiMcpServer::prompt_router()
}

const GETTING_STARTED_TEMPLATE: &str = include_str!("../templates/prompts/getting-started.md");
const SELECT_COMPONENT_TEMPLATE: &str = include_str!("../templates/prompts/select-component.md");
const SELECT_TEMPLATE_TEMPLATE: &str = include_str!("../templates/prompts/select-template.md");
const APPLY_COMPONENT_TEMPLATE: &str = include_str!("../templates/prompts/apply-component.md");
const APPLY_TEMPLATE_TEMPLATE: &str = include_str!("../templates/prompts/apply-template.md");

const MAX_RECOMMENDATIONS: usize = 3;
const DEFAULT_BRAND: &str = "YourBrand";
const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GettingStartedPromptArgs {
    #[schemars(description = "Kind of project to create (landing page, dashboard, blog, ...).")]
    pub project_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Preferred framework (next, vite, ...).")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SelectComponentPromptArgs {
    #[schemars(description = "What the component is for (hero section, pricing table, ...).")]
    pub use_case: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Preferred style (minimal, modern, animated, ...).")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SelectTemplatePromptArgs {
    #[schemars(description = "Kind of project (landing, dashboard, blog, ...).")]
    pub project_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Required features (auth, payments, cms, ...).")]
    pub features: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplyComponentPromptArgs {
    pub component_id: String,
    #[schemars(description = "Root of the project receiving the component.")]
    pub project_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTemplatePromptArgs {
    pub template_id: String,
    #[schemars(description = "Directory where the project is created.")]
    pub project_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

#[prompt_router]
impl DooiMcpServer {
    #[prompt(
        name = "getting-started",
        description = "Recommended first step: pick a dooi-ui template for a new project and apply it"
    )]
    pub async fn getting_started_prompt(
        &self,
        Parameters(args): Parameters<GettingStartedPromptArgs>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let project_type = required(&args.project_type, "projectType")?;
        let catalog = self.catalog(ItemKind::Template).await;
        let details = detail_lines(&[
            ("Project type", Some(project_type)),
            ("Framework", args.framework.as_deref()),
            ("Project name", args.project_name.as_deref()),
        ]);
        let brand = non_blank(args.project_name.as_deref()).unwrap_or(DEFAULT_BRAND);

        render(
            GETTING_STARTED_TEMPLATE,
            &[
                ("details", details),
                ("catalog", catalog.listing(false)),
                ("recommendations", catalog.recommendations(project_type)),
                ("brand", brand.to_string()),
                ("path_strategy", path_strategy_for(args.framework.as_deref()).to_string()),
            ],
        )
    }

    #[prompt(
        name = "select-component",
        description = "Guide the user to a dooi component that fits their use case"
    )]
    pub async fn select_component_prompt(
        &self,
        Parameters(args): Parameters<SelectComponentPromptArgs>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let use_case = required(&args.use_case, "useCase")?;
        let catalog = self.catalog(ItemKind::Component).await;
        let details = detail_lines(&[
            ("Use case", Some(use_case)),
            ("Framework", args.framework.as_deref()),
            ("Style", args.style.as_deref()),
        ]);
        let query = join_query(use_case, args.style.as_deref());

        render(
            SELECT_COMPONENT_TEMPLATE,
            &[
                ("details", details),
                ("catalog", catalog.listing(true)),
                ("recommendations", catalog.recommendations(&query)),
                ("path_strategy", path_strategy_for(args.framework.as_deref()).to_string()),
            ],
        )
    }

    #[prompt(
        name = "select-template",
        description = "Guide the user to a dooi template for their project"
    )]
    pub async fn select_template_prompt(
        &self,
        Parameters(args): Parameters<SelectTemplatePromptArgs>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let project_type = required(&args.project_type, "projectType")?;
        let catalog = self.catalog(ItemKind::Template).await;
        let details = detail_lines(&[
            ("Project type", Some(project_type)),
            ("Framework", args.framework.as_deref()),
            ("Features", args.features.as_deref()),
        ]);
        let query = join_query(project_type, args.features.as_deref());

        render(
            SELECT_TEMPLATE_TEMPLATE,
            &[
                ("details", details),
                ("catalog", catalog.listing(false)),
                ("recommendations", catalog.recommendations(&query)),
                ("path_strategy", path_strategy_for(args.framework.as_deref()).to_string()),
            ],
        )
    }

    #[prompt(
        name = "apply-component",
        description = "Walk through applying a dooi component to an existing project"
    )]
    pub async fn apply_component_prompt(
        &self,
        Parameters(args): Parameters<ApplyComponentPromptArgs>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let component_id = required(&args.component_id, "componentId")?;
        let project_path = required(&args.project_path, "projectPath")?;
        let brand = non_blank(args.brand_name.as_deref());
        let arguments = workflow_arguments(component_id, project_path, brand)?;

        render(
            APPLY_COMPONENT_TEMPLATE,
            &[
                ("component_id", component_id.to_string()),
                ("project_path", project_path.to_string()),
                (
                    "brand_line",
                    brand.map(|b| format!("Brand: **{b}**")).unwrap_or_default(),
                ),
                ("arguments", arguments),
            ],
        )
    }

    #[prompt(
        name = "apply-template",
        description = "Walk through creating a new project from a dooi template"
    )]
    pub async fn apply_template_prompt(
        &self,
        Parameters(args): Parameters<ApplyTemplatePromptArgs>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let template_id = required(&args.template_id, "templateId")?;
        let project_path = required(&args.project_path, "projectPath")?;
        let project_name = non_blank(args.project_name.as_deref());
        let brand = project_name.unwrap_or(DEFAULT_BRAND);
        let arguments = workflow_arguments(template_id, project_path, Some(brand))?;

        render(
            APPLY_TEMPLATE_TEMPLATE,
            &[
                ("template_id", template_id.to_string()),
                ("project_path", project_path.to_string()),
                (
                    "project_line",
                    project_name
                        .map(|name| format!("Project name: **{name}**"))
                        .unwrap_or_default(),
                ),
                ("arguments", arguments),
            ],
        )
    }
}

impl DooiMcpServer {
    /// Catalog entries of `kind`; a failed listing degrades to a notice.
    async fn catalog(&self, kind: ItemKind) -> Catalog {
        match self.client.list().await {
            Ok(list) => Catalog::Listed {
                kind,
                items: list
                    .items
                    .into_iter()
                    .filter(|item| item.kind == kind && !item.is_placeholder())
                    .collect(),
            },
            Err(err) => {
                tracing::warn!(code = %err.code, error = %err, "catalog listing failed");
                Catalog::Unavailable(err.message)
            }
        }
    }
}

pub(crate) enum Catalog {
    Listed { kind: ItemKind, items: Vec<CatalogItem> },
    Unavailable(String),
}

impl Catalog {
    fn listing(&self, grouped: bool) -> String {
        let (kind, items) = match self {
            Catalog::Unavailable(reason) => return format!("_Catalog unavailable: {reason}_"),
            Catalog::Listed { kind, items } => (kind, items),
        };
        if items.is_empty() {
            return format!(
                "_No {}s available. Check that dooi-ui is installed and reachable._",
                kind.as_str()
            );
        }

        let header = format!("{} available.\n\n", items.len());
        if !grouped {
            return header + &bullets(items.iter());
        }

        let mut groups: Vec<(&str, Vec<&CatalogItem>)> = Vec::new();
        for item in items {
            let category = item.category.as_deref().unwrap_or(OTHER_CATEGORY);
            match groups.iter_mut().find(|(name, _)| *name == category) {
                Some((_, members)) => members.push(item),
                None => groups.push((category, vec![item])),
            }
        }
        let sections: Vec<String> = groups
            .into_iter()
            .map(|(name, members)| format!("### {name}\n\n{}", bullets(members.into_iter())))
            .collect();
        header + &sections.join("\n\n")
    }

    fn recommendations(&self, query: &str) -> String {
        let Catalog::Listed { items, .. } = self else {
            return "_No recommendations without a catalog._".to_string();
        };
        let picks = recommend(query, items);
        if picks.is_empty() {
            return "_Nothing in the catalog matched closely; pick from the list above._"
                .to_string();
        }
        format!("Closest matches:\n\n{}", bullets(picks.into_iter()))
    }
}

/// Ranks `items` by fuzzy similarity of each query term against id, description, and tags.
pub(crate) fn recommend<'a>(query: &str, items: &'a [CatalogItem]) -> Vec<&'a CatalogItem> {
    let matcher = SkimMatcherV2::default().ignore_case();
    let terms: Vec<&str> = query
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .collect();

    let mut scored: Vec<(i64, &CatalogItem)> = items
        .iter()
        .filter_map(|item| {
            let haystack = searchable_text(item);
            let score: i64 = terms
                .iter()
                .filter_map(|term| matcher.fuzzy_match(&haystack, term))
                .sum();
            (score > 0).then_some((score, item))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
    scored
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|(_, item)| item)
        .collect()
}

fn searchable_text(item: &CatalogItem) -> String {
    let mut text = format!("{} {}", item.id, item.description);
    for tag in item.tags.iter().flatten() {
        text.push(' ');
        text.push_str(tag);
    }
    text
}

fn bullets<'a>(items: impl Iterator<Item = &'a CatalogItem>) -> String {
    items
        .map(|item| format!("- **{}**: {}", item.id, item.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn detail_lines(fields: &[(&str, Option<&str>)]) -> String {
    fields
        .iter()
        .filter_map(|(label, value)| non_blank(*value).map(|v| format!("- **{label}**: {v}")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_query(primary: &str, extra: Option<&str>) -> String {
    match non_blank(extra) {
        Some(extra) => format!("{primary} {extra}"),
        None => primary.to_string(),
    }
}

fn path_strategy_for(framework: Option<&str>) -> PathStrategy {
    match framework {
        Some(name) if name.to_lowercase().contains("vite") => PathStrategy::ViteReact,
        _ => PathStrategy::NextApp,
    }
}

fn workflow_arguments(
    id: &str,
    dest_root: &str,
    brand: Option<&str>,
) -> Result<String, McpError> {
    let mut arguments = Map::new();
    arguments.insert("id".into(), json!(id));
    arguments.insert("destRoot".into(), json!(dest_root));
    if let Some(brand) = brand {
        arguments.insert("brand".into(), json!(brand));
    }
    arguments.insert("pathStrategy".into(), json!(PathStrategy::NextApp.as_str()));
    arguments.insert("autoDeps".into(), json!(true));
    serde_json::to_string_pretty(&Value::Object(arguments))
        .map_err(|err| to_mcp_error(err.into()))
}

fn required<'a>(value: &'a str, name: &str) -> Result<&'a str, McpError> {
    non_blank(Some(value)).ok_or_else(|| invalid_params(format!("{name} is required")))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn render(template: &str, values: &[(&str, String)]) -> Result<Vec<PromptMessage>, McpError> {
    let rendered = apply_tokens(template, values)?;
    Ok(vec![PromptMessage::new_text(PromptMessageRole::User, rendered)])
}

/// Substitutes `{{name}}` tokens in one pass. A token without a value is an error.
pub(crate) fn apply_tokens(
    template: &str,
    values: &[(&str, String)],
) -> Result<String, McpError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| template_error("unterminated template token".to_string()))?;
        let name = after[..end].trim();
        let value = values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| template_error(format!("unresolved template token: {name}")))?;
        rendered.push_str(value);
        rest = &after[end + 2..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

fn template_error(message: String) -> McpError {
    to_mcp_error(DooiError::internal(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, kind: ItemKind, description: &str, tags: &[&str]) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            kind,
            title: id.to_string(),
            description: description.to_string(),
            tags: (!tags.is_empty()).then(|| tags.iter().map(|t| t.to_string()).collect()),
            category: None,
        }
    }

    #[test]
    fn tokens_are_substituted_once() {
        let rendered = apply_tokens(
            "Hello {{name}}, see {{ place }}.",
            &[("name", "{{place}}".to_string()), ("place", "docs".to_string())],
        )
        .unwrap();
        assert_eq!(rendered, "Hello {{place}}, see docs.");
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = apply_tokens("{{missing}}", &[]).unwrap_err();
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn every_template_renders_with_its_tokens() {
        let cases: [(&str, &[&str]); 5] = [
            (
                GETTING_STARTED_TEMPLATE,
                &["details", "catalog", "recommendations", "brand", "path_strategy"],
            ),
            (
                SELECT_COMPONENT_TEMPLATE,
                &["details", "catalog", "recommendations", "path_strategy"],
            ),
            (
                SELECT_TEMPLATE_TEMPLATE,
                &["details", "catalog", "recommendations", "path_strategy"],
            ),
            (
                APPLY_COMPONENT_TEMPLATE,
                &["component_id", "project_path", "brand_line", "arguments"],
            ),
            (
                APPLY_TEMPLATE_TEMPLATE,
                &["template_id", "project_path", "project_line", "arguments"],
            ),
        ];
        for (template, tokens) in cases {
            let values: Vec<(&str, String)> =
                tokens.iter().map(|t| (*t, "x".to_string())).collect();
            let rendered = apply_tokens(template, &values).unwrap();
            assert!(!rendered.contains("{{"));
        }
    }

    #[test]
    fn recommendations_rank_closest_items_first() {
        let items = vec![
            item("dashboard-pro", ItemKind::Template, "Admin dashboard", &[]),
            item("landing-morphic", ItemKind::Template, "Landing page with morphing hero", &[]),
            item("blog-minimal", ItemKind::Template, "Minimal blog", &["writing"]),
        ];
        let picks = recommend("landing", &items);
        assert_eq!(picks[0].id, "landing-morphic");

        let picks = recommend("writing", &items);
        assert_eq!(picks[0].id, "blog-minimal");

        assert!(recommend("", &items).is_empty());
    }

    #[test]
    fn listing_groups_components_by_category() {
        let mut hero = item("hero/aurora", ItemKind::Component, "Aurora hero", &[]);
        hero.category = Some("Hero".into());
        let button = item("ui/button", ItemKind::Component, "Button", &[]);
        let catalog = Catalog::Listed {
            kind: ItemKind::Component,
            items: vec![hero, button],
        };

        let listing = catalog.listing(true);
        assert!(listing.starts_with("2 available."));
        assert!(listing.contains("### Hero\n\n- **hero/aurora**: Aurora hero"));
        assert!(listing.contains("### Other\n\n- **ui/button**: Button"));
    }

    #[test]
    fn unavailable_catalog_degrades_to_notice() {
        let catalog = Catalog::Unavailable("dooi-ui CLI not found".into());
        assert!(catalog.listing(false).contains("Catalog unavailable"));
        assert!(catalog.recommendations("landing").contains("No recommendations"));
    }

    #[test]
    fn vite_frameworks_pick_vite_strategy() {
        assert_eq!(path_strategy_for(Some("Vite")), PathStrategy::ViteReact);
        assert_eq!(path_strategy_for(Some("next")), PathStrategy::NextApp);
        assert_eq!(path_strategy_for(None), PathStrategy::NextApp);
    }
}

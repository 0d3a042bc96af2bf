//! Parsers for the human-oriented output of the `dooi-ui` CLI.
//!
//! The CLI prints decorated text rather than a machine format, so both parsers are
//! best-effort: unknown lines are ignored and missing fields fall back to defaults.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COMPONENT_DESCRIPTION: &str = "Component from dooi-ui";
pub const DEFAULT_TEMPLATE_DESCRIPTION: &str = "Template from dooi-ui";

const TITLE_MARKERS: &[&str] = &["Component:", "Template:"];
const CODE_MARKERS: &[&str] = &["Component Code:", "Template Code:"];
const INSTALL_MARKER: &str = "npm install ";
const PEER_MARKER: &str = "Peer dependencies:";
const USES_MARKER: &str = "Uses components:";
const DESCRIPTION_MARKER: &str = "Description:";
const BULLETS: &[char] = &['•', '-', '*'];

/// Metadata of one fetched artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMeta {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub peer_dependencies: Vec<String>,
    #[serde(default)]
    pub uses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_block: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaState {
    SeekingTitle,
    SeekingDeps,
    InUses,
    InCode { fenced: bool, captured: bool },
    Done,
}

/// Extracts [`ComponentMeta`] from `get` output.
pub fn parse_component_meta(id: &str, stdout: &str) -> ComponentMeta {
    let mut meta = ComponentMeta {
        id: id.to_string(),
        ..ComponentMeta::default()
    };
    let mut code_lines: Vec<&str> = Vec::new();
    let mut state = MetaState::SeekingTitle;

    for line in stdout.lines() {
        let trimmed = line.trim();
        state = match state {
            MetaState::Done => break,
            MetaState::InCode { fenced, captured } => {
                if trimmed.starts_with("```") || trimmed == "`" {
                    if captured {
                        MetaState::Done
                    } else {
                        MetaState::InCode {
                            fenced: true,
                            captured,
                        }
                    }
                } else if trimmed.is_empty() {
                    if fenced {
                        if captured {
                            code_lines.push(line);
                        }
                        state
                    } else if captured {
                        MetaState::Done
                    } else {
                        state
                    }
                } else {
                    code_lines.push(line);
                    MetaState::InCode {
                        fenced,
                        captured: true,
                    }
                }
            }
            MetaState::InUses if is_bullet(trimmed) => {
                if let Some(used) = bullet_id(trimmed) {
                    meta.uses.push(used);
                }
                MetaState::InUses
            }
            MetaState::InUses if trimmed.is_empty() => MetaState::InUses,
            MetaState::SeekingTitle | MetaState::SeekingDeps | MetaState::InUses => {
                read_marker(&mut meta, trimmed, state)
            }
        };
    }

    while code_lines.last().is_some_and(|line| line.trim().is_empty()) {
        code_lines.pop();
    }
    if !code_lines.is_empty() {
        meta.code_block = Some(code_lines.join("\n"));
    }
    if meta.title.is_empty() {
        meta.title = id.to_string();
    }
    if meta.description.is_empty() {
        meta.description = DEFAULT_COMPONENT_DESCRIPTION.to_string();
    }

    tracing::debug!(
        id,
        dependencies = meta.dependencies.len(),
        uses = meta.uses.len(),
        has_code = meta.code_block.is_some(),
        "parsed component metadata"
    );
    meta
}

fn read_marker(meta: &mut ComponentMeta, trimmed: &str, state: MetaState) -> MetaState {
    if CODE_MARKERS.iter().any(|marker| trimmed.contains(marker)) {
        return MetaState::InCode {
            fenced: false,
            captured: false,
        };
    }

    if TITLE_MARKERS.iter().any(|marker| trimmed.contains(marker)) {
        if let Some((_, title)) = trimmed.split_once(':') {
            let title = title.trim();
            if !title.is_empty() {
                meta.title = title.to_string();
            }
        }
        return MetaState::SeekingDeps;
    }

    if let Some((_, packages)) = trimmed.split_once(INSTALL_MARKER) {
        meta.dependencies = packages
            .split_whitespace()
            .filter(|pkg| !pkg.starts_with('-'))
            .map(str::to_string)
            .collect();
        return MetaState::SeekingDeps;
    }

    if let Some((_, peers)) = trimmed.split_once(PEER_MARKER) {
        meta.peer_dependencies = split_list(peers);
        return MetaState::SeekingDeps;
    }

    if let Some((_, inline)) = trimmed.split_once(USES_MARKER) {
        meta.uses.extend(split_list(inline));
        return MetaState::InUses;
    }

    if let Some(description) = trimmed.strip_prefix(DESCRIPTION_MARKER) {
        meta.description = description.trim().to_string();
        return MetaState::SeekingDeps;
    }

    match state {
        MetaState::InUses => MetaState::SeekingDeps,
        other => other,
    }
}

fn is_bullet(trimmed: &str) -> bool {
    trimmed.starts_with(BULLETS)
}

/// `• ui/button: Button` -> `ui/button`.
fn bullet_id(trimmed: &str) -> Option<String> {
    let text = trimmed.trim_start_matches(BULLETS).trim();
    let id = text.split(':').next().unwrap_or(text).trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Component,
    Template,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Component => "component",
            ItemKind::Template => "template",
        }
    }
}

/// One entry of the `list` catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CatalogItem {
    /// Marker entry returned when `list` printed nothing recognizable.
    pub fn parsing_failed() -> Self {
        Self {
            id: "parsing-failed".to_string(),
            kind: ItemKind::Component,
            title: "Parsing Failed".to_string(),
            description:
                "Unable to parse dooi-ui list output. Raw output available in response."
                    .to_string(),
            tags: None,
            category: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == "parsing-failed"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Components,
    Templates,
}

/// Parses `list` output into catalog items; never returns an empty list.
pub fn parse_list_output(stdout: &str) -> Vec<CatalogItem> {
    let mut items = Vec::new();
    let mut section = Section::None;
    let mut category: Option<String> = None;
    let mut lines = stdout.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();

        if trimmed.contains("📦 Components:") || trimmed == "Components:" {
            section = Section::Components;
            continue;
        }
        if trimmed.contains("🏗️ Templates:") || trimmed == "Templates:" {
            section = Section::Templates;
            continue;
        }
        if trimmed.is_empty()
            || trimmed.starts_with("Usage:")
            || trimmed.starts_with("npx")
            || trimmed.starts_with('🎨')
        {
            continue;
        }

        match section {
            Section::Components => {
                if let Some(header) = trimmed.strip_suffix(':') {
                    category = Some(header.trim().to_string());
                    continue;
                }
                let Some(text) = trimmed.strip_prefix("• ") else {
                    continue;
                };
                let (id, description) = split_entry(text, DEFAULT_COMPONENT_DESCRIPTION);
                let tags = lines
                    .next_if(|next| next.trim().starts_with("Tags:"))
                    .map(|next| {
                        next.trim()
                            .trim_start_matches("Tags:")
                            .split(',')
                            .map(|tag| tag.trim().to_string())
                            .collect::<Vec<_>>()
                    });
                items.push(CatalogItem {
                    title: id.clone(),
                    id,
                    kind: ItemKind::Component,
                    description,
                    tags,
                    category: category.clone(),
                });
            }
            Section::Templates => {
                let Some(text) = trimmed.strip_prefix("• ") else {
                    continue;
                };
                let (id, description) = split_entry(text, DEFAULT_TEMPLATE_DESCRIPTION);
                items.push(CatalogItem {
                    title: id.clone(),
                    id,
                    kind: ItemKind::Template,
                    description,
                    tags: None,
                    category: None,
                });
            }
            Section::None => {}
        }
    }

    if items.is_empty() {
        tracing::warn!("no items could be parsed from list output");
        items.push(CatalogItem::parsing_failed());
    }
    items
}

fn split_entry(text: &str, fallback: &str) -> (String, String) {
    match text.split_once(':') {
        Some((id, description)) if !id.trim().is_empty() => {
            (id.trim().to_string(), description.trim().to_string())
        }
        _ => (text.trim().to_string(), fallback.to_string()),
    }
}

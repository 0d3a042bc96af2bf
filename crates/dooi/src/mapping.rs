use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{DooiError, ErrorCode, Result};
use crate::guard::is_safe_path;

/// Named framework layouts with a built-in mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PathStrategy {
    /// Next.js App Router: sources under `src/`, static assets under `public/`.
    NextApp,
    /// Vite + React: sources and assets under `src/`.
    ViteReact,
}

/// Entries shared by both layouts.
const COMMON_ENTRIES: &[(&str, &str)] = &[
    ("components/", "src/components/"),
    ("ui/", "src/components/ui/"),
    ("lib/", "src/lib/"),
    ("hooks/", "src/hooks/"),
    ("utils/", "src/utils/"),
    ("types/", "src/types/"),
    ("public/", "public/"),
    ("styles/", "src/styles/"),
    ("css/", "src/styles/"),
    ("scss/", "src/styles/"),
    ("package.json", "package.json"),
    ("tsconfig.json", "tsconfig.json"),
    ("tailwind.config.js", "tailwind.config.js"),
    ("tailwind.config.ts", "tailwind.config.ts"),
    (".env.example", ".env.example"),
    (".gitignore", ".gitignore"),
    ("README.md", "README.md"),
];

const NEXT_APP_ENTRIES: &[(&str, &str)] = &[
    ("app/page.tsx", "app/page.tsx"),
    ("app/layout.tsx", "app/layout.tsx"),
    ("app/globals.css", "app/globals.css"),
    ("pages/", "app/"),
    ("page/", "app/"),
    ("assets/", "public/assets/"),
    ("images/", "public/images/"),
    ("icons/", "public/icons/"),
    ("next.config.js", "next.config.js"),
    ("next.config.ts", "next.config.ts"),
];

const VITE_REACT_ENTRIES: &[(&str, &str)] = &[
    ("assets/", "src/assets/"),
    ("images/", "src/assets/images/"),
    ("icons/", "src/assets/icons/"),
    ("index.html", "index.html"),
    ("vite.config.js", "vite.config.js"),
    ("vite.config.ts", "vite.config.ts"),
];

impl PathStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            PathStrategy::NextApp => "next-app",
            PathStrategy::ViteReact => "vite-react",
        }
    }

    pub fn mapping(self) -> PathMapping {
        let specific = match self {
            PathStrategy::NextApp => NEXT_APP_ENTRIES,
            PathStrategy::ViteReact => VITE_REACT_ENTRIES,
        };
        COMMON_ENTRIES
            .iter()
            .chain(specific)
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }
}

impl fmt::Display for PathStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathStrategy {
    type Err = DooiError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "next-app" => Ok(PathStrategy::NextApp),
            "vite-react" => Ok(PathStrategy::ViteReact),
            other => Err(DooiError::invalid_input("Invalid path strategy")
                .detail("pathStrategy", other)),
        }
    }
}

/// Source-prefix to destination-prefix table.
///
/// Lookups try an exact key first, then the longest key that is a whole-segment prefix of the
/// source path. Keys may be written with or without a trailing `/`. Paths without a matching
/// entry pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PathMapping {
    entries: BTreeMap<String, String>,
}

impl PathMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.entries.insert(from.into(), to.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Layers `overrides` on top of `self`, key by key.
    pub fn merged(mut self, overrides: &PathMapping) -> PathMapping {
        for (from, to) in &overrides.entries {
            self.entries.insert(from.clone(), to.clone());
        }
        self
    }

    /// Every key and value must be a non-empty, relative, traversal-free path.
    pub fn validate(&self) -> Result<()> {
        for (from, to) in &self.entries {
            for path in [from, to] {
                let trimmed = path.trim();
                let rooted = trimmed.starts_with('/')
                    || trimmed.starts_with('\\')
                    || trimmed.as_bytes().get(1) == Some(&b':');
                let traverses = trimmed.split(['/', '\\']).any(|segment| segment == "..");
                if trimmed.is_empty() || rooted || traverses || !is_safe_path(trimmed) {
                    return Err(DooiError::with_message(
                        ErrorCode::InvalidPathMap,
                        format!("Invalid path mapping entry: '{from}' -> '{to}'"),
                    )
                    .detail("source", from.as_str())
                    .detail("destination", to.as_str()));
                }
            }
        }
        Ok(())
    }

    pub fn apply(&self, source: &str) -> String {
        if let Some(exact) = self.entries.get(source) {
            return exact.clone();
        }

        let mut best: Option<(&str, &str)> = None;
        for (from, to) in &self.entries {
            let prefix = from.trim_end_matches('/');
            if prefix.is_empty() {
                continue;
            }
            let covers = source == prefix
                || source
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'));
            if covers && best.is_none_or(|(current, _)| prefix.len() > current.len()) {
                best = Some((prefix, to.as_str()));
            }
        }

        match best {
            Some((prefix, to)) => {
                let remainder = &source[prefix.len()..];
                let base = to.trim_end_matches('/');
                if base.is_empty() {
                    remainder.trim_start_matches('/').to_string()
                } else {
                    format!("{base}{remainder}")
                }
            }
            None => source.to_string(),
        }
    }
}

impl FromIterator<(String, String)> for PathMapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, String>> for PathMapping {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Combines a named strategy with caller overrides; either may be absent.
pub fn resolve_mapping(
    strategy: Option<PathStrategy>,
    overrides: Option<&PathMapping>,
) -> Result<PathMapping> {
    if let Some(overrides) = overrides {
        overrides.validate()?;
    }
    let base = strategy.map(PathStrategy::mapping).unwrap_or_default();
    Ok(match overrides {
        Some(overrides) => base.merged(overrides),
        None => base,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: &[(&str, &str)]) -> PathMapping {
        entries
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn empty_mapping_is_identity() {
        let empty = PathMapping::new();
        for path in ["a.tsx", "components/ui/button.tsx", "", ".env.example"] {
            assert_eq!(empty.apply(path), path);
        }
    }

    #[test]
    fn exact_match_wins_over_prefix() {
        let map = mapping(&[
            ("ui/", "src/components/ui/"),
            ("ui/button.tsx", "special/btn.tsx"),
        ]);
        assert_eq!(map.apply("ui/button.tsx"), "special/btn.tsx");
        assert_eq!(map.apply("ui/card.tsx"), "src/components/ui/card.tsx");
    }

    #[test]
    fn longest_prefix_wins() {
        let map = mapping(&[
            ("components", "src/components"),
            ("components/ui", "src/ui"),
        ]);
        assert_eq!(map.apply("components/ui/button.tsx"), "src/ui/button.tsx");
        assert_eq!(map.apply("components/card.tsx"), "src/components/card.tsx");
    }

    #[test]
    fn prefix_must_end_on_segment_boundary() {
        let map = mapping(&[("ui", "src/ui")]);
        assert_eq!(map.apply("uikit/a.tsx"), "uikit/a.tsx");
        assert_eq!(map.apply("ui"), "src/ui");
    }

    #[test]
    fn strategies_differ_on_assets() {
        assert_eq!(
            PathStrategy::NextApp.mapping().apply("assets/logo.svg"),
            "public/assets/logo.svg"
        );
        assert_eq!(
            PathStrategy::ViteReact.mapping().apply("assets/logo.svg"),
            "src/assets/logo.svg"
        );
        assert_eq!(
            PathStrategy::NextApp.mapping().apply("components/ui/button.tsx"),
            "src/components/ui/button.tsx"
        );
        assert_eq!(PathStrategy::ViteReact.mapping().apply("package.json"), "package.json");
    }

    #[test]
    fn overrides_replace_strategy_entries() {
        let overrides = mapping(&[("assets/", "static/")]);
        let map = resolve_mapping(Some(PathStrategy::NextApp), Some(&overrides)).unwrap();
        assert_eq!(map.apply("assets/a.png"), "static/a.png");
    }

    #[test]
    fn escaping_entries_are_rejected() {
        let bad = mapping(&[("ui/", "../outside/")]);
        assert_eq!(bad.validate().unwrap_err().code(), ErrorCode::InvalidPathMap);
        let rooted = mapping(&[("ui/", "/etc/")]);
        assert_eq!(rooted.validate().unwrap_err().code(), ErrorCode::InvalidPathMap);
    }

    #[test]
    fn unknown_strategy_is_invalid_input() {
        let err = "remix".parse::<PathStrategy>().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }
}

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Patterns copied out of a staging directory when the caller does not supply any.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &[
    "**/*.ts",
    "**/*.tsx",
    "**/*.js",
    "**/*.jsx",
    "**/*.css",
    "**/*.scss",
    "**/*.sass",
    "**/*.less",
    "**/*.html",
    "**/*.htm",
    "**/*.json",
    "**/*.md",
    "**/*.txt",
    "**/*.svg",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.webp",
    "**/*.ico",
    "**/*.woff",
    "**/*.woff2",
    "**/*.ttf",
    "**/*.eot",
    "**/*.otf",
];

/// Build output, dependency trees, editor state, and secrets never leave the stage.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "node_modules/**",
    ".git/**",
    ".DS_Store",
    "Thumbs.db",
    "*.log",
    "*.tmp",
    "*.temp",
    ".env*",
    "dist/**",
    "build/**",
    ".next/**",
    ".nuxt/**",
    ".vscode/**",
    ".idea/**",
    "*.swp",
    "*.swo",
    "*~",
];

/// Directory holding fetch metadata inside a staging directory.
pub const STAGE_META_DIR: &str = ".dooi";
pub const STAGE_META_FILE: &str = "meta.json";
pub const STAGE_MANIFEST_FILE: &str = "package.json";
pub const STAGE_DIR_PREFIX: &str = "dooi-stage-";

/// Extensions the text editor will touch. Dotfiles such as `.gitignore` match on their name.
pub const TEXT_FILE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "css", "scss", "sass", "less", "html", "htm", "json", "md", "txt",
    "xml", "yaml", "yml", "env", "gitignore", "eslintrc", "prettierrc", "editorconfig",
    "dockerignore", "npmignore",
];

pub const MAX_FILES_PER_OPERATION: usize = 1000;
pub const MAX_FILE_SIZE_MB: u64 = 50;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_PREVIEW_CONTEXT_LINES: usize = 3;
pub const MAX_PATTERN_LENGTH: usize = 1000;
pub const MAX_PACKAGE_NAME_LENGTH: usize = 214;

const DEFAULT_PROGRAM: &str = "npx";
const DEFAULT_PROGRAM_ARGS: &[&str] = &["dooi-ui"];

/// How the external `dooi-ui` CLI is invoked and where its output is staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DooiConfig {
    pub program: String,
    /// Arguments placed before the subcommand (`get`, `list`).
    pub program_args: Vec<String>,
    pub timeout: Duration,
    pub stage_root: PathBuf,
}

impl Default for DooiConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            program_args: DEFAULT_PROGRAM_ARGS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            stage_root: env::temp_dir(),
        }
    }
}

impl DooiConfig {
    /// Reads `DOOI_CLI`, `DOOI_TIMEOUT_MS`, and `DOOI_STAGE_ROOT`, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = env::var("DOOI_CLI") {
            config = config.with_cli_command(&raw);
        }

        if let Some(timeout) = env::var("DOOI_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
        {
            config.timeout = Duration::from_millis(timeout);
        }

        if let Some(root) = env::var("DOOI_STAGE_ROOT")
            .ok()
            .filter(|root| !root.trim().is_empty())
        {
            config.stage_root = PathBuf::from(root);
        }

        config
    }

    /// Replaces the CLI invocation with a whitespace-separated command line.
    /// Blank input leaves the current command untouched.
    pub fn with_cli_command(mut self, command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        if let Some(program) = parts.next() {
            self.program = program;
            self.program_args = parts.collect();
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.stage_root = root.into();
        self
    }
}

pub fn default_include() -> Vec<String> {
    DEFAULT_INCLUDE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

/// Default copy excludes, plus the staging metadata directory.
pub fn default_exclude() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .chain(std::iter::once(format!("{STAGE_META_DIR}/**")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_command_splits_program_and_args() {
        let config = DooiConfig::default().with_cli_command("pnpm dlx dooi-ui");
        assert_eq!(config.program, "pnpm");
        assert_eq!(config.program_args, vec!["dlx", "dooi-ui"]);
    }

    #[test]
    fn blank_cli_command_keeps_default() {
        let config = DooiConfig::default().with_cli_command("   ");
        assert_eq!(config.program, "npx");
        assert_eq!(config.program_args, vec!["dooi-ui"]);
    }

    #[test]
    fn default_exclude_hides_stage_metadata() {
        assert!(default_exclude().iter().any(|p| p == ".dooi/**"));
    }
}

//! Package manager detection and dependency installation.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_TIMEOUT_MS, MAX_PACKAGE_NAME_LENGTH};
use crate::error::{DooiError, ErrorCode, Result};
use crate::runner::{CommandRunner, EXIT_COMMAND_NOT_FOUND, Invocation};

const MANIFEST_FILE: &str = "package.json";
const STDOUT_TAIL_LINES: usize = 20;
const SUCCESS_MARKERS: &[&str] = &["added", "installed", "✓", "success"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

/// Detection order: the first lock file present wins.
const DETECTION_ORDER: &[PackageManager] =
    &[PackageManager::Pnpm, PackageManager::Yarn, PackageManager::Npm];

impl PackageManager {
    pub fn binary(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
        }
    }

    pub fn lock_file(self) -> &'static str {
        match self {
            PackageManager::Npm => "package-lock.json",
            PackageManager::Yarn => "yarn.lock",
            PackageManager::Pnpm => "pnpm-lock.yaml",
        }
    }

    pub fn add_command(self) -> &'static str {
        match self {
            PackageManager::Npm => "install",
            PackageManager::Yarn | PackageManager::Pnpm => "add",
        }
    }

    pub fn install_command(self) -> &'static str {
        "install"
    }

    pub fn dev_flag(self) -> &'static str {
        match self {
            PackageManager::Yarn => "--dev",
            PackageManager::Npm | PackageManager::Pnpm => "--save-dev",
        }
    }

    pub fn peer_flag(self) -> &'static str {
        match self {
            PackageManager::Yarn => "--peer",
            PackageManager::Npm | PackageManager::Pnpm => "--save-peer",
        }
    }

    pub fn info(self) -> PackageManagerInfo {
        PackageManagerInfo {
            name: self,
            lock_file: self.lock_file().to_string(),
            install_command: vec![self.install_command().to_string()],
            add_command: vec![self.add_command().to_string()],
            run_command: vec!["run".to_string()],
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for PackageManager {
    type Err = DooiError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "npm" => Ok(PackageManager::Npm),
            "yarn" => Ok(PackageManager::Yarn),
            "pnpm" => Ok(PackageManager::Pnpm),
            other => Err(DooiError::invalid_input(format!(
                "Unknown package manager: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackageManagerInfo {
    pub name: PackageManager,
    pub lock_file: String,
    pub install_command: Vec<String>,
    pub add_command: Vec<String>,
    pub run_command: Vec<String>,
}

/// Lock files decide first; a bare `package.json` means npm; no manifest means `None`.
pub fn detect_package_manager(cwd: &Path) -> Option<PackageManagerInfo> {
    let detected = DETECTION_ORDER
        .iter()
        .copied()
        .find(|pm| cwd.join(pm.lock_file()).is_file())
        .or_else(|| {
            cwd.join(MANIFEST_FILE)
                .is_file()
                .then_some(PackageManager::Npm)
        });
    tracing::debug!(cwd = %cwd.display(), pm = ?detected, "detected package manager");
    detected.map(PackageManager::info)
}

/// Uses `requested` when given, otherwise detects one in `cwd`.
pub fn resolve_package_manager(
    cwd: &Path,
    requested: Option<PackageManager>,
) -> Result<PackageManager> {
    requested
        .or_else(|| detect_package_manager(cwd).map(|info| info.name))
        .ok_or_else(|| {
            DooiError::with_message(ErrorCode::PmNotFound, "No package manager found")
                .detail("cwd", cwd.display().to_string())
        })
}

pub fn validate_package_names<S: AsRef<str>>(packages: &[S]) -> Result<()> {
    for package in packages {
        let package = package.as_ref();
        if package.trim().is_empty() {
            return Err(DooiError::invalid_input("Invalid package name").detail("package", package));
        }
        if package.contains("..") || package.contains("/..") || package.starts_with('/') {
            return Err(
                DooiError::invalid_input("Package name contains dangerous patterns")
                    .detail("package", package),
            );
        }
        if package.len() > MAX_PACKAGE_NAME_LENGTH {
            return Err(
                DooiError::invalid_input("Package name too long").detail("package", package)
            );
        }
    }
    Ok(())
}

/// Splits `name@version`; scoped names keep their leading `@`.
pub fn parse_package_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.rfind('@') {
        Some(0) | None => (spec, None),
        Some(at) => (&spec[..at], Some(&spec[at + 1..])),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub cwd: PathBuf,
    pub packages: Vec<String>,
    pub pm: Option<PackageManager>,
    pub flags: Vec<String>,
    pub dev: bool,
    pub peer: bool,
    pub timeout: Duration,
}

impl InstallRequest {
    pub fn new(cwd: impl Into<PathBuf>, packages: Vec<String>) -> Self {
        Self {
            cwd: cwd.into(),
            packages,
            pm: None,
            flags: Vec::new(),
            dev: false,
            peer: false,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Add-command arguments for `pm`: subcommand, dev/peer flag, extra flags, packages.
    pub fn args(&self, pm: PackageManager) -> Vec<String> {
        let mut args = vec![pm.add_command().to_string()];
        if self.dev {
            args.push(pm.dev_flag().to_string());
        }
        if self.peer {
            args.push(pm.peer_flag().to_string());
        }
        args.extend(self.flags.iter().cloned());
        args.extend(self.packages.iter().cloned());
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub success: bool,
    pub pm: PackageManager,
    pub command: String,
    pub args: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub installed_packages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl InstallResult {
    /// Last lines of stdout, for compact responses.
    pub fn stdout_tail(&self) -> String {
        let lines: Vec<&str> = self.stdout.lines().collect();
        let start = lines.len().saturating_sub(STDOUT_TAIL_LINES);
        lines[start..].join("\n")
    }
}

/// Installs `request.packages` with the requested or detected package manager.
///
/// A non-zero exit is reported through `success: false`; only validation, a missing
/// package manager, and timeouts are errors.
pub async fn install_packages(
    runner: &dyn CommandRunner,
    request: &InstallRequest,
) -> Result<InstallResult> {
    if request.packages.is_empty() {
        return Err(DooiError::invalid_input("No packages specified"));
    }
    validate_package_names(&request.packages)?;
    let pm = resolve_package_manager(&request.cwd, request.pm)?;
    let args = request.args(pm);
    run_package_manager(runner, request, pm, args).await
}

/// Runs the plain install command (no packages) to restore a project's dependencies.
pub async fn install_all(
    runner: &dyn CommandRunner,
    request: &InstallRequest,
) -> Result<InstallResult> {
    let pm = resolve_package_manager(&request.cwd, request.pm)?;
    let mut args = vec![pm.install_command().to_string()];
    args.extend(request.flags.iter().cloned());
    run_package_manager(runner, request, pm, args).await
}

async fn run_package_manager(
    runner: &dyn CommandRunner,
    request: &InstallRequest,
    pm: PackageManager,
    args: Vec<String>,
) -> Result<InstallResult> {
    let invocation =
        Invocation::new(pm.binary(), &request.cwd, request.timeout).args(args.iter().cloned());
    tracing::info!(
        command = %invocation.command_line(),
        cwd = %request.cwd.display(),
        "installing packages"
    );

    let output = runner.run(&invocation).await?;
    if output.exit_code == EXIT_COMMAND_NOT_FOUND {
        return Err(DooiError::with_message(
            ErrorCode::PmNotFound,
            format!("Package manager not found: {}", pm.binary()),
        )
        .detail("pm", pm.binary())
        .detail("stderr", output.stderr));
    }

    let success = output.success();
    let installed_packages = confirmed_packages(&request.packages, &output.stdout, success);
    let mut errors = Vec::new();
    if !success {
        errors.push(format!("Package manager exited with code {}", output.exit_code));
        if !output.stderr.trim().is_empty() {
            errors.push(output.stderr.trim().to_string());
        }
        tracing::warn!(pm = %pm, exit_code = output.exit_code, "package manager failed");
    }

    Ok(InstallResult {
        success,
        pm,
        command: pm.binary().to_string(),
        args,
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
        installed_packages,
        errors,
    })
}

fn confirmed_packages(packages: &[String], stdout: &str, success: bool) -> Vec<String> {
    let reports_success = SUCCESS_MARKERS.iter().any(|marker| stdout.contains(marker));
    let confirmed: Vec<String> = packages
        .iter()
        .filter(|spec| reports_success && stdout.contains(parse_package_spec(spec).0))
        .cloned()
        .collect();

    if confirmed.is_empty() && success {
        packages.to_vec()
    } else {
        confirmed
    }
}

/// The subset of `package.json` consulted before installing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Version range declared for `package` in any dependency table.
    pub fn declared_version(&self, package: &str) -> Option<&str> {
        let name = parse_package_spec(package).0;
        self.dependencies
            .get(name)
            .or_else(|| self.dev_dependencies.get(name))
            .or_else(|| self.peer_dependencies.get(name))
            .map(String::as_str)
    }

    pub fn is_declared(&self, package: &str) -> bool {
        self.declared_version(package).is_some()
    }
}

/// Reads `cwd/package.json`; `None` when the file does not exist.
pub fn read_manifest(cwd: &Path) -> Result<Option<PackageManifest>> {
    let path = cwd.join(MANIFEST_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    let manifest = serde_json::from_str(&raw).map_err(|err| {
        DooiError::with_message(
            ErrorCode::ParseFailed,
            format!("Failed to parse {}: {err}", path.display()),
        )
    })?;
    Ok(Some(manifest))
}

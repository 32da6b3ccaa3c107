//! Treadmill configuration stored in `treadmill.toml` at the repository root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::ci_order::TaskOrder;
use crate::core::vendor_commit::VendorLayout;

pub const DEFAULT_CONFIG_FILE: &str = "treadmill.toml";

/// Treadmill configuration (TOML).
///
/// Missing fields default to the podman/buildah vendoring layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreadmillConfig {
    /// Trunk the treadmill is rebased onto. The tool never runs on it.
    pub integration_branch: String,

    /// Sentinel patch file, relative to the repository root.
    pub sentinel_file: String,

    pub upstream: UpstreamConfig,
    pub dependency: DependencyConfig,
    pub manifest: ManifestConfig,
    pub treadmill: TitleConfig,
    pub ci: CiConfig,
    pub commands: CommandsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// `owner/name` of the consuming project on the forge.
    pub repo: String,
    /// GraphQL endpoint used to find the treadmill PR.
    pub api_url: String,
    /// Environment variable holding an optional bearer token.
    pub token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DependencyConfig {
    /// Module path of the tracked dependency.
    pub module: String,
    /// Upstream development ref the treadmill follows.
    pub dev_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManifestConfig {
    pub lock_file: String,
    pub checksum_file: String,
    pub vendor_metadata: String,
    pub vendor_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TitleConfig {
    /// Exact title of the treadmill pull request.
    pub pr_title: String,
    /// Regex the treadmill commit's subject must match.
    pub subject_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CiConfig {
    /// CI task file, relative to the repository root.
    pub path: String,
    /// Static validation task (without the `_task` suffix).
    pub validate_task: String,
    /// The dependency's integration test task.
    pub integration_task: String,
    /// Aggregate task that must keep depending on everything.
    pub terminal_task: String,
}

/// External collaborator commands, as argv lists.
///
/// `{module}` and `{ref}` are replaced with the dependency settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    pub repin: Vec<String>,
    pub revendor: Vec<String>,
    pub build: Vec<String>,
    pub docs_xref: Vec<String>,
    pub integration_dry_run: Vec<String>,
}

impl Default for TreadmillConfig {
    fn default() -> Self {
        Self {
            integration_branch: "main".to_string(),
            sentinel_file: "treadmill-recovery.patch".to_string(),
            upstream: UpstreamConfig::default(),
            dependency: DependencyConfig::default(),
            manifest: ManifestConfig::default(),
            treadmill: TitleConfig::default(),
            ci: CiConfig::default(),
            commands: CommandsConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            repo: "containers/podman".to_string(),
            api_url: "https://api.github.com/graphql".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            module: "github.com/containers/buildah".to_string(),
            dev_ref: "main".to_string(),
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            lock_file: "go.mod".to_string(),
            checksum_file: "go.sum".to_string(),
            vendor_metadata: "vendor/modules.txt".to_string(),
            vendor_dir: "vendor".to_string(),
        }
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            pr_title: "DO NOT MERGE: buildah vendor treadmill".to_string(),
            subject_pattern: r"(?i)vendor treadmill".to_string(),
        }
    }
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            path: ".cirrus.yml".to_string(),
            validate_task: "validate".to_string(),
            integration_task: "buildah_bud_test".to_string(),
            terminal_task: "success".to_string(),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            repin: argv(&["go", "get", "{module}@{ref}"]),
            revendor: argv(&["make", "vendor"]),
            build: argv(&["make"]),
            docs_xref: argv(&["hack/xref-helpmsgs-manpages"]),
            integration_dry_run: argv(&["test/buildah-bud/run-buildah-bud-tests", "--no-test"]),
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

impl TreadmillConfig {
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("integration_branch", &self.integration_branch),
            ("sentinel_file", &self.sentinel_file),
            ("upstream.api_url", &self.upstream.api_url),
            ("dependency.module", &self.dependency.module),
            ("dependency.dev_ref", &self.dependency.dev_ref),
            ("manifest.lock_file", &self.manifest.lock_file),
            ("manifest.checksum_file", &self.manifest.checksum_file),
            ("manifest.vendor_metadata", &self.manifest.vendor_metadata),
            ("manifest.vendor_dir", &self.manifest.vendor_dir),
            ("treadmill.pr_title", &self.treadmill.pr_title),
            ("ci.path", &self.ci.path),
            ("ci.validate_task", &self.ci.validate_task),
            ("ci.integration_task", &self.ci.integration_task),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{key} must not be empty"));
            }
        }

        let slug_parts: Vec<&str> = self.upstream.repo.split('/').collect();
        if slug_parts.len() != 2 || slug_parts.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!(
                "upstream.repo must be 'owner/name', got '{}'",
                self.upstream.repo
            ));
        }

        Regex::new(&self.treadmill.subject_pattern)
            .with_context(|| "treadmill.subject_pattern is not a valid regex")?;

        for (key, command) in [
            ("commands.repin", &self.commands.repin),
            ("commands.revendor", &self.commands.revendor),
            ("commands.build", &self.commands.build),
            ("commands.docs_xref", &self.commands.docs_xref),
            ("commands.integration_dry_run", &self.commands.integration_dry_run),
        ] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(anyhow!("{key} must be a non-empty array"));
            }
        }
        Ok(())
    }

    /// Directory holding the vendored copy of the tracked dependency.
    pub fn dependency_vendor_dir(&self) -> String {
        format!(
            "{}/{}/",
            self.manifest.vendor_dir.trim_end_matches('/'),
            self.dependency.module.trim_matches('/')
        )
    }

    pub fn vendor_layout(&self) -> VendorLayout {
        VendorLayout {
            lock_file: self.manifest.lock_file.clone(),
            checksum_file: self.manifest.checksum_file.clone(),
            vendor_metadata: self.manifest.vendor_metadata.clone(),
            dependency_dir: self.dependency_vendor_dir(),
        }
    }

    pub fn task_order(&self) -> TaskOrder {
        TaskOrder {
            validate: self.ci.validate_task.clone(),
            integration: self.ci.integration_task.clone(),
            terminal: self.ci.terminal_task.clone(),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TreadmillConfig::default()`.
pub fn load_config(path: &Path) -> Result<TreadmillConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        let cfg = TreadmillConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TreadmillConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

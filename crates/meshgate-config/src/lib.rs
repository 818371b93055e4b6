//! Configuration management for meshgate
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (MESHGATE_* prefix, highest precedence)
//! 2. meshgate.local.toml (gitignored, local overrides)
//! 3. meshgate.toml (git-tracked, project config)
//! 4. ~/.config/meshgate/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main meshgate configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshgateConfig {
    pub engine: EngineConfig,
    pub policy: PolicyConfig,
}

/// Decision engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log every decision through `tracing`.
    pub audit_log: bool,
    /// Namespace for policy entries that do not name one.
    pub default_namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_log: true,
            default_namespace: "default".to_string(),
        }
    }
}

/// Where the policy document lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub path: PathBuf,
    pub format: PolicyFormat,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("policy.toml"),
            format: PolicyFormat::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyFormat {
    /// Pick by file extension (`.json` is JSON, anything else TOML)
    #[default]
    Auto,
    Toml,
    Json,
}

impl PolicyConfig {
    /// Resolve `Auto` against the policy path
    pub fn effective_format(&self) -> PolicyFormat {
        match self.format {
            PolicyFormat::Auto => {
                let is_json = self
                    .path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                if is_json {
                    PolicyFormat::Json
                } else {
                    PolicyFormat::Toml
                }
            }
            explicit => explicit,
        }
    }
}

impl MeshgateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Read a single TOML file without layering
    pub fn from_toml_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.engine.default_namespace.is_empty() {
            return Err(ConfigError::ValidationError(
                "engine.default_namespace must not be empty".to_string(),
            ));
        }
        if self.policy.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "policy.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.policy.path.is_relative() {
            self.policy.path = base.join(&self.policy.path);
        }
    }
}

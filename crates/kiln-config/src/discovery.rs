//! File-based project configuration discovery.
//!
//! Finds `kiln.toml` (or a `kiln` field in `package.json`) and layers it
//! over the built-in defaults and `KILN_*` environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format as _, Json, Serialized, Toml};
use figment::Figment;
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::project::ProjectConfig;

pub const CONFIG_FILE: &str = "kiln.toml";

/// Where the project configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Toml(PathBuf),
    PackageJson(PathBuf),
    Defaults,
}

/// Searches a project root for configuration and loads it.
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigDiscovery;
///
/// let project = ConfigDiscovery::new(".").load().unwrap();
/// assert_eq!(project.dev.host, "localhost");
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the configuration source.
    ///
    /// Searches in this order:
    /// 1. `kiln.toml`
    /// 2. `package.json` with a non-null `kiln` field
    pub fn find(&self) -> ConfigSource {
        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.is_file() {
            return ConfigSource::Toml(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        if let Ok(content) = fs::read_to_string(&pkg_path) {
            if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                if parsed.get("kiln").is_some_and(|v| !v.is_null()) {
                    return ConfigSource::PackageJson(pkg_path);
                }
            }
        }

        ConfigSource::Defaults
    }

    /// Load the project configuration.
    ///
    /// Priority: environment (`KILN_DEV__PORT`, `HOST`, `PORT`, ...) > file >
    /// defaults.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the root directory does not exist
    /// - `Extract` if the file has invalid syntax or field types
    pub fn load(&self) -> Result<ProjectConfig> {
        if !self.root.is_dir() {
            return Err(ConfigError::NotFound(self.root.clone()));
        }

        let source = self.find();
        tracing::debug!(?source, "loading project configuration");

        let mut figment = Figment::new().merge(Serialized::defaults(ProjectConfig::default()));
        figment = match &source {
            ConfigSource::Toml(path) => figment.merge(Toml::file(path)),
            ConfigSource::PackageJson(path) => {
                let content = fs::read_to_string(path)?;
                let parsed: Value = serde_json::from_str(&content).map_err(|e| {
                    ConfigError::invalid("package.json", format!("invalid JSON: {e}"))
                })?;
                figment.merge(Json::string(&parsed["kiln"].to_string()))
            }
            ConfigSource::Defaults => figment,
        };
        figment = figment.merge(Env::prefixed("KILN_").split("__"));

        let mut project: ProjectConfig = figment.extract()?;
        project.dev.apply_env()?;
        Ok(project)
    }
}

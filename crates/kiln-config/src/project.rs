//! User-facing project configuration (`kiln.toml`).
//!
//! ```toml
//! [base]
//! entry = { app = "src/main.js" }
//! use_eslint = true
//!
//! [dev]
//! port = 8080
//! error_overlay = true
//!
//! [dev.proxy]
//! "/api" = "http://localhost:3000"
//!
//! [build]
//! assets_root = "dist"
//! production_gzip = true
//! ```

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::asset::DEFAULT_INLINE_LIMIT;
use crate::error::{ConfigError, Result};
use crate::options::TemplateOptions;
use crate::rules::TransformRule;
use crate::split::DEFAULT_MIN_SHARED_REFERENCES;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub base: BaseSettings,
    pub dev: DevSettings,
    pub build: BuildSettings,
}

/// Settings shared by both modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSettings {
    pub entry: IndexMap<String, PathBuf>,
    pub source_dir: PathBuf,
    pub test_dir: PathBuf,
    /// Run the lint pre-stage on script and component modules.
    pub use_eslint: bool,
    /// Lint violations become overlay errors instead of console warnings.
    pub show_eslint_errors_in_overlay: bool,
    pub asset_inline_limit: u64,
    pub extensions: Vec<String>,
    pub alias: IndexMap<String, PathBuf>,
    pub main_fields: Vec<String>,
    pub condition_names: Vec<String>,
    pub define: IndexMap<String, String>,
    pub template: TemplateOptions,
    /// Extra rules appended after the built-in base rules.
    pub rules: Vec<TransformRule>,
}

impl Default for BaseSettings {
    fn default() -> Self {
        let mut entry = IndexMap::new();
        entry.insert("app".to_string(), PathBuf::from("src/main.js"));
        let mut alias = IndexMap::new();
        alias.insert("@".to_string(), PathBuf::from("src"));
        Self {
            entry,
            source_dir: PathBuf::from("src"),
            test_dir: PathBuf::from("test"),
            use_eslint: true,
            show_eslint_errors_in_overlay: false,
            asset_inline_limit: DEFAULT_INLINE_LIMIT,
            extensions: vec![".js".into(), ".vue".into(), ".json".into()],
            alias,
            main_fields: vec!["browser".into(), "module".into(), "main".into()],
            condition_names: vec![
                "browser".into(),
                "import".into(),
                "module".into(),
                "default".into(),
            ],
            define: IndexMap::new(),
            template: TemplateOptions::default(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevSettings {
    pub host: String,
    pub port: u16,
    pub port_scan_limit: u16,
    pub assets_subdir: String,
    pub assets_public_path: String,
    /// Document template, relative to the project root.
    pub index: PathBuf,
    pub auto_open_browser: bool,
    pub error_overlay: bool,
    pub poll: Option<u64>,
    pub css_source_map: bool,
    pub cache_busting: bool,
    /// Path prefix to upstream origin for requests the server does not own.
    pub proxy: IndexMap<String, String>,
    pub rules: Vec<TransformRule>,
}

impl Default for DevSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            port_scan_limit: 100,
            assets_subdir: "static".to_string(),
            assets_public_path: "/".to_string(),
            index: PathBuf::from("index.html"),
            auto_open_browser: false,
            error_overlay: true,
            poll: None,
            css_source_map: true,
            cache_busting: true,
            proxy: IndexMap::new(),
            rules: Vec::new(),
        }
    }
}

impl DevSettings {
    /// Apply `HOST` and `PORT` from the environment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` when `PORT` is not a valid port number.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            if !host.trim().is_empty() {
                self.host = host;
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            self.port = port.trim().parse().map_err(|_| {
                ConfigError::invalid("PORT", format!("'{port}' is not a valid port number"))
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Document template, relative to the project root.
    pub template: PathBuf,
    /// Emitted document, relative to `assets_root`.
    pub index: String,
    pub assets_root: PathBuf,
    pub assets_subdir: String,
    pub assets_public_path: String,
    pub production_source_map: bool,
    pub production_gzip: bool,
    pub production_gzip_extensions: Vec<String>,
    pub bundle_analyzer_report: bool,
    pub min_shared_references: usize,
    pub rules: Vec<TransformRule>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            template: PathBuf::from("index.html"),
            index: "index.html".to_string(),
            assets_root: PathBuf::from("dist"),
            assets_subdir: "static".to_string(),
            assets_public_path: "/".to_string(),
            production_source_map: true,
            production_gzip: false,
            production_gzip_extensions: vec!["js".into(), "css".into()],
            bundle_analyzer_report: false,
            min_shared_references: DEFAULT_MIN_SHARED_REFERENCES,
            rules: Vec::new(),
        }
    }
}

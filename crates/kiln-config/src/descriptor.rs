//! The fully composed, immutable configuration for one build.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mode::BuildMode;
use crate::paths::PathResolver;
use crate::registry::RuleRegistry;
use crate::rules::TransformRule;
use crate::stage::{BuildFlags, OptimizationStage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Extensions probed, in order, for extension-less specifiers.
    pub extensions: Vec<String>,
    /// Specifier prefix to absolute directory.
    pub alias: IndexMap<String, PathBuf>,
    /// `package.json` fields read, in order, for a package's entry module.
    pub main_fields: Vec<String>,
    /// Conditions matched against `package.json` `exports` maps.
    pub condition_names: Vec<String>,
}

/// Settings for the development server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    /// How many ports above `port` are tried before giving up.
    pub port_scan_limit: u16,
    /// Serve the entry document for unmatched navigation requests.
    pub history_fallback: bool,
    /// Show build errors in a full-screen overlay. Warnings are never shown.
    pub error_overlay: bool,
    pub live_reload: bool,
    /// Poll the file system at this interval instead of native events.
    pub poll_interval_ms: Option<u64>,
    pub open_browser: bool,
    /// Path prefix to upstream origin, e.g. `/api` to `http://localhost:3000`.
    pub proxy: IndexMap<String, String>,
}

impl Default for DevServerOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            port_scan_limit: 100,
            history_fallback: true,
            error_overlay: true,
            live_reload: true,
            poll_interval_ms: None,
            open_browser: false,
            proxy: IndexMap::new(),
        }
    }
}

/// Exactly one of development server options or production stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "settings", rename_all = "lowercase")]
pub enum ModeProfile {
    Development(DevServerOptions),
    Production(Vec<OptimizationStage>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    pub mode: BuildMode,
    pub context: PathBuf,
    /// Bundle name to entry module.
    pub entry_points: IndexMap<String, PathBuf>,
    pub output_root: PathBuf,
    pub output_public_path: String,
    pub assets_subdir: String,
    pub transform_rules: Vec<TransformRule>,
    pub resolve: ResolveOptions,
    /// Identifier to replacement source text.
    pub define: IndexMap<String, String>,
    pub flags: BuildFlags,
    /// Document template; a built-in shell is used when absent.
    pub html_template: Option<PathBuf>,
    /// Emitted document path relative to `output_root`.
    pub html_filename: String,
    pub profile: ModeProfile,
}

impl BuildDescriptor {
    /// Stages in execution order. Empty outside production.
    pub fn optimization_stages(&self) -> &[OptimizationStage] {
        match &self.profile {
            ModeProfile::Production(stages) => stages,
            ModeProfile::Development(_) => &[],
        }
    }

    pub fn dev_server_options(&self) -> Option<&DevServerOptions> {
        match &self.profile {
            ModeProfile::Development(opts) => Some(opts),
            ModeProfile::Production(_) => None,
        }
    }

    pub fn path_resolver(&self) -> PathResolver {
        PathResolver::new(self.assets_subdir.clone(), self.mode)
    }

    pub fn rule_registry(&self) -> Result<RuleRegistry> {
        RuleRegistry::new(&self.transform_rules, &self.context)
    }

    /// Public URL for an output path relative to `output_root`.
    pub fn public_url(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.output_public_path.is_empty() {
            return relative.to_string();
        }
        let base = self.output_public_path.trim_end_matches('/');
        format!("{base}/{relative}")
    }
}

//! Output naming templates.
//!
//! Every emitted artifact is named from a template such as
//! `static/js/[name].[chunkhash].js`. The resolver owns the per-mode
//! templates; [`render`] fills them in.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::asset::AssetCategory;
use crate::mode::BuildMode;

/// Length of the hash embedded in asset file names.
pub const ASSET_HASH_LENGTH: usize = 7;

static HASH_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(hash|chunkhash|contenthash)(?::(\d+))?\]").expect("static regex")
});

/// Kinds of output the resolver can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Entry, vendor and manifest chunks.
    Script,
    /// Chunks loaded through dynamic `import()`.
    AsyncScript,
    /// Extracted style sheets.
    Style,
    Asset(AssetCategory),
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateVars<'a> {
    pub name: &'a str,
    pub id: &'a str,
    pub ext: &'a str,
    pub hash: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    assets_subdir: String,
    mode: BuildMode,
}

impl PathResolver {
    pub fn new(assets_subdir: impl Into<String>, mode: BuildMode) -> Self {
        Self {
            assets_subdir: assets_subdir.into().trim_matches('/').to_string(),
            mode,
        }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Join `relative` under the configured assets subdirectory.
    pub fn assets_path(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.assets_subdir.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.assets_subdir, relative)
        }
    }

    pub fn template(&self, kind: OutputKind) -> String {
        let production = self.mode.is_production();
        match kind {
            OutputKind::Script if production => self.assets_path("js/[name].[chunkhash].js"),
            OutputKind::AsyncScript if production => self.assets_path("js/[id].[chunkhash].js"),
            OutputKind::Script => "[name].js".to_string(),
            OutputKind::AsyncScript => "[id].js".to_string(),
            OutputKind::Style => self.assets_path("css/[name].[contenthash].css"),
            OutputKind::Asset(category) => self.assets_path(&format!(
                "{}/[name].[hash:{ASSET_HASH_LENGTH}].[ext]",
                category.dir()
            )),
        }
    }

    /// Render the template for `kind`.
    pub fn name(&self, kind: OutputKind, vars: &TemplateVars<'_>) -> String {
        render(&self.template(kind), vars)
    }
}

/// Substitute placeholders in `template`.
///
/// Supports `[name]`, `[id]`, `[ext]` and the hash family `[hash]`,
/// `[chunkhash]`, `[contenthash]`, each optionally truncated as `[hash:N]`.
pub fn render(template: &str, vars: &TemplateVars<'_>) -> String {
    let hashed = HASH_PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let len = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(vars.hash.len());
        vars.hash[..len.min(vars.hash.len())].to_string()
    });

    hashed
        .replace("[name]", vars.name)
        .replace("[id]", vars.id)
        .replace("[ext]", vars.ext)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// First `len` hex digits of [`content_hash`].
pub fn short_hash(bytes: &[u8], len: usize) -> String {
    let mut hash = content_hash(bytes);
    hash.truncate(len);
    hash
}

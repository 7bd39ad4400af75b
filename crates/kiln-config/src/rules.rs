//! Transform rule definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::asset::AssetCategoryRule;
use crate::matcher::Matcher;

/// Identifies a transformer in a rule's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformId {
    Lint,
    Template,
    Script,
    Json,
    Css,
    Postcss,
    Less,
    Sass,
    Scss,
    Stylus,
    StyleInject,
    StyleExtract,
    Url,
}

impl TransformId {
    pub fn as_str(self) -> &'static str {
        match self {
            TransformId::Lint => "lint",
            TransformId::Template => "template",
            TransformId::Script => "script",
            TransformId::Json => "json",
            TransformId::Css => "css",
            TransformId::Postcss => "postcss",
            TransformId::Less => "less",
            TransformId::Sass => "sass",
            TransformId::Scss => "scss",
            TransformId::Stylus => "stylus",
            TransformId::StyleInject => "style-inject",
            TransformId::StyleExtract => "style-extract",
            TransformId::Url => "url",
        }
    }
}

impl fmt::Display for TransformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The broad kind of processing a rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Concern {
    Lint,
    Script,
    Template,
    Style,
    Data,
    Asset,
}

/// When a rule runs relative to the main chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforce {
    #[default]
    Normal,
    /// Runs before the main chain and does not compete for first match.
    Pre,
}

/// Associates a module predicate with an ordered transform chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRule {
    pub name: String,
    pub concern: Concern,
    pub test: Matcher,
    /// Path prefixes the rule is limited to; empty means everywhere.
    #[serde(default)]
    pub include: Vec<PathBuf>,
    #[serde(default)]
    pub enforce: Enforce,
    pub chain: Vec<TransformId>,
    /// Per-transform configuration, opaque to the registry.
    #[serde(default)]
    pub options: serde_json::Value,
    #[serde(default)]
    pub asset: Option<AssetCategoryRule>,
}

impl TransformRule {
    pub fn new(
        name: impl Into<String>,
        concern: Concern,
        test: Matcher,
        chain: impl IntoIterator<Item = TransformId>,
    ) -> Self {
        Self {
            name: name.into(),
            concern,
            test,
            include: Vec::new(),
            enforce: Enforce::Normal,
            chain: chain.into_iter().collect(),
            options: serde_json::Value::Null,
            asset: None,
        }
    }

    pub fn include<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.include = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn enforce_pre(mut self) -> Self {
        self.enforce = Enforce::Pre;
        self
    }

    pub fn options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    pub fn asset(mut self, rule: AssetCategoryRule) -> Self {
        self.asset = Some(rule);
        self
    }

    pub fn is_pre(&self) -> bool {
        self.enforce == Enforce::Pre
    }
}

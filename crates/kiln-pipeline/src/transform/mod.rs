//! Per-module transformers.
//!
//! The rule registry decides *which* transforms run on a module; this module
//! supplies the implementations. Each [`Transformer`] mutates a
//! [`SourceModule`] in place, and the engine applies a resolved chain step
//! by step.

mod asset;
mod data;
mod lint;
mod script;
mod style;
mod template;

use std::path::{Path, PathBuf};

use kiln_config::{BuildDescriptor, ChainStep, ResolvedChain, TransformId};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;

use crate::error::{Diagnostic, TransformError};
use crate::graph::{EmittedFile, ModuleKind, StyleSink};
use crate::scan::ImportRequest;

pub use asset::UrlTransformer;
pub use data::JsonTransformer;
pub use lint::LintTransformer;
pub use script::ScriptTransformer;
pub(crate) use style::normalize_css;
pub use style::{CssTransformer, PostcssTransformer, PreprocessorTransformer, StyleSinkTransformer};
pub use template::{CompiledComponent, SfcCompiler, StyleBlock, TemplateCompiler, TemplateTransformer};

/// A module as it flows through its transform chain.
#[derive(Debug, Clone)]
pub struct SourceModule {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub code: String,
    pub kind: ModuleKind,
    pub style: Option<String>,
    pub style_sink: StyleSink,
    pub asset_url: Option<String>,
    pub emitted: Option<EmittedFile>,
    /// Dependencies discovered by transformers rather than by scanning code.
    pub imports: Vec<ImportRequest>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SourceModule {
    pub fn new(path: PathBuf, bytes: Vec<u8>) -> Self {
        let code = String::from_utf8_lossy(&bytes).into_owned();
        Self {
            path,
            bytes,
            code,
            kind: ModuleKind::Script,
            style: None,
            style_sink: StyleSink::default(),
            asset_url: None,
            emitted: None,
            imports: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// `export default "<url>"`, the script face of an asset.
    pub(crate) fn export_url(&mut self, url: String) {
        self.code = format!("export default {};", json_string(&url));
        self.asset_url = Some(url);
    }
}

/// Replacement source text for configured identifiers.
#[derive(Debug, Clone, Default)]
pub struct Defines {
    patterns: Vec<(Regex, String)>,
}

impl Defines {
    pub fn new<'a>(define: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let patterns = define
            .into_iter()
            .filter_map(|(key, value)| {
                let pattern = format!(r"(^|[^\w$.]){}\b", regex::escape(key));
                Regex::new(&pattern).ok().map(|re| (re, value.clone()))
            })
            .collect();
        Self { patterns }
    }

    pub fn apply(&self, code: &str) -> String {
        let mut out = code.to_string();
        for (pattern, value) in &self.patterns {
            out = pattern
                .replace_all(&out, |caps: &regex::Captures<'_>| format!("{}{}", &caps[1], value))
                .into_owned();
        }
        out
    }
}

pub struct TransformContext<'a> {
    pub descriptor: &'a BuildDescriptor,
    pub defines: &'a Defines,
    pub chain: &'a ResolvedChain<'a>,
}

pub trait Transformer: Send + Sync {
    fn id(&self) -> TransformId;

    fn apply(
        &self,
        module: &mut SourceModule,
        step: &ChainStep<'_>,
        cx: &TransformContext<'_>,
    ) -> Result<(), TransformError>;
}

/// Transformers by id.
pub struct TransformerSet {
    transformers: FxHashMap<TransformId, Box<dyn Transformer>>,
}

impl Default for TransformerSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TransformerSet {
    pub fn empty() -> Self {
        Self {
            transformers: FxHashMap::default(),
        }
    }

    /// Every built-in transformer. Preprocessor ids are registered with a
    /// transformer that reports the missing compiler.
    pub fn builtin() -> Self {
        let mut set = Self::empty()
            .with(LintTransformer)
            .with(TemplateTransformer::new(SfcCompiler))
            .with(ScriptTransformer)
            .with(JsonTransformer)
            .with(PostcssTransformer)
            .with(CssTransformer)
            .with(StyleSinkTransformer::inject())
            .with(StyleSinkTransformer::extract())
            .with(UrlTransformer);
        for id in [
            TransformId::Less,
            TransformId::Sass,
            TransformId::Scss,
            TransformId::Stylus,
        ] {
            set = set.with(PreprocessorTransformer::new(id));
        }
        set
    }

    /// Register `transformer`, replacing any with the same id.
    pub fn with(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformers
            .insert(transformer.id(), Box::new(transformer));
        self
    }

    pub fn get(&self, id: TransformId) -> Option<&dyn Transformer> {
        self.transformers.get(&id).map(|t| t.as_ref())
    }

    /// Run every step of `cx.chain` in order, stopping at the first failure.
    pub fn run_chain(
        &self,
        module: &mut SourceModule,
        cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        for step in &cx.chain.steps {
            let transformer = self.get(step.transform).ok_or_else(|| {
                TransformError::new(step.transform, "no transformer is registered for this id")
            })?;
            tracing::trace!(
                module = %module.path.display(),
                transform = %step.transform,
                rule = step.rule,
                "applying transform"
            );
            transformer.apply(module, step, cx)?;
        }
        Ok(())
    }
}

/// Decode a step's options, treating `null` as the defaults.
pub(crate) fn options<T: DeserializeOwned + Default>(
    step: &ChainStep<'_>,
) -> Result<T, TransformError> {
    if step.options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(step.options.clone())
        .map_err(|e| TransformError::new(step.transform, format!("invalid options: {e}")))
}

pub(crate) fn json_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

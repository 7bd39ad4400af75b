//! Production optimization stages.
//!
//! The production overlay carries an explicit, ordered list of stages. The
//! pipeline runs them in list order and never reorders them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::split::ChunkSplitPolicy;

/// Bytes below which compression is not attempted.
pub const DEFAULT_COMPRESS_THRESHOLD: u64 = 10_240;
/// A compressed copy is kept only if `compressed / original` is at most this.
pub const DEFAULT_COMPRESS_MIN_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    ExtractStyles,
    DedupeStyles,
    Minify,
    HashModuleIds,
    ConcatenateModules,
    SplitChunks,
    NameOutputs,
    EmitHtml,
    Compress,
    Analyze,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::ExtractStyles => "extract-styles",
            StageKind::DedupeStyles => "dedupe-styles",
            StageKind::Minify => "minify",
            StageKind::HashModuleIds => "hash-module-ids",
            StageKind::ConcatenateModules => "concatenate-modules",
            StageKind::SplitChunks => "split-chunks",
            StageKind::NameOutputs => "name-outputs",
            StageKind::EmitHtml => "emit-html",
            StageKind::Compress => "compress",
            StageKind::Analyze => "analyze",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toggles frozen into the descriptor at composition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildFlags {
    pub gzip: bool,
    pub report: bool,
    pub source_map: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildFlag {
    Gzip,
    Report,
    SourceMap,
}

/// Predicate deciding whether a stage runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Condition {
    #[default]
    Always,
    Flag { name: BuildFlag },
}

impl Condition {
    pub fn holds(&self, flags: &BuildFlags) -> bool {
        match self {
            Condition::Always => true,
            Condition::Flag { name } => match name {
                BuildFlag::Gzip => flags.gzip,
                BuildFlag::Report => flags.report,
                BuildFlag::SourceMap => flags.source_map,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStylesOptions {
    /// Name template for extracted sheets.
    pub filename: String,
    /// Pull styles of async chunks into the entry's sheet as well.
    pub all_chunks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeStylesOptions {
    /// Only apply transformations that cannot change rendering.
    pub safe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinifyOptions {
    pub parallel: bool,
    /// Discard minifier warnings instead of reporting them.
    pub drop_warnings: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashModuleIdsOptions {
    pub digest_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitChunksOptions {
    pub vendor: ChunkSplitPolicy,
    pub runtime: ChunkSplitPolicy,
    pub shared_async: ChunkSplitPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameOutputsOptions {
    pub script: String,
    pub async_script: String,
}

/// How injected tags are ordered in the emitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkOrder {
    /// Manifest first, then vendor, shared, entries.
    #[default]
    Dependency,
    /// Order chunks were produced.
    Insertion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlMinify {
    pub remove_comments: bool,
    pub collapse_whitespace: bool,
    pub remove_attribute_quotes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitHtmlOptions {
    pub inject: bool,
    pub minify: Option<HtmlMinify>,
    pub chunk_order: ChunkOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressOptions {
    pub algorithm: String,
    pub extensions: Vec<String>,
    pub threshold: u64,
    pub min_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    pub report_filename: String,
    pub stats_filename: String,
}

/// What a stage does, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parameters", rename_all = "kebab-case")]
pub enum Stage {
    ExtractStyles(ExtractStylesOptions),
    DedupeStyles(DedupeStylesOptions),
    Minify(MinifyOptions),
    HashModuleIds(HashModuleIdsOptions),
    ConcatenateModules,
    SplitChunks(SplitChunksOptions),
    NameOutputs(NameOutputsOptions),
    EmitHtml(EmitHtmlOptions),
    Compress(CompressOptions),
    Analyze(AnalyzeOptions),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::ExtractStyles(_) => StageKind::ExtractStyles,
            Stage::DedupeStyles(_) => StageKind::DedupeStyles,
            Stage::Minify(_) => StageKind::Minify,
            Stage::HashModuleIds(_) => StageKind::HashModuleIds,
            Stage::ConcatenateModules => StageKind::ConcatenateModules,
            Stage::SplitChunks(_) => StageKind::SplitChunks,
            Stage::NameOutputs(_) => StageKind::NameOutputs,
            Stage::EmitHtml(_) => StageKind::EmitHtml,
            Stage::Compress(_) => StageKind::Compress,
            Stage::Analyze(_) => StageKind::Analyze,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStage {
    #[serde(flatten)]
    pub stage: Stage,
    #[serde(default)]
    pub condition: Condition,
}

impl OptimizationStage {
    pub fn always(stage: Stage) -> Self {
        Self {
            stage,
            condition: Condition::Always,
        }
    }

    pub fn when(flag: BuildFlag, stage: Stage) -> Self {
        Self {
            stage,
            condition: Condition::Flag { name: flag },
        }
    }

    pub fn kind(&self) -> StageKind {
        self.stage.kind()
    }

    pub fn enabled(&self, flags: &BuildFlags) -> bool {
        self.condition.holds(flags)
    }
}

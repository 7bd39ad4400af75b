//! The production optimization pipeline.
//!
//! Stages run in the order the descriptor lists them, each over the shared
//! [`BuildState`]. A stage whose condition does not hold is skipped; a stage
//! that fails stops the pipeline and nothing is published.

mod analyze;
mod compress;
mod concat;
mod html;
mod ids;
mod minify;
mod naming;
pub mod split;
mod styles;

use std::time::Instant;

use kiln_config::stage::Stage;
use kiln_config::BuildDescriptor;

use crate::engine::EngineOutput;
use crate::error::{Error, Result};
use crate::graph::{ModuleGraph, ModuleId};
use crate::output::{BuildArtifacts, ChunkKind, ChunkSummary, OutputSet};

pub(crate) use html::{document_template, inject_tags};
pub use minify::minify_script;
pub use split::ChunkPlan;

type StageResult = std::result::Result<(), String>;

/// A style sheet assembled for one entry point.
#[derive(Debug, Clone)]
pub struct ExtractedSheet {
    pub entry: String,
    pub css: String,
    pub filename_template: String,
    pub modules: Vec<ModuleId>,
}

#[derive(Debug, Clone)]
pub struct RenderedChunk {
    pub id: String,
    pub kind: ChunkKind,
    pub file: String,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderedOutputs {
    /// In the order they were rendered; the manifest comes last.
    pub chunks: Vec<RenderedChunk>,
    /// Entry name and file of each extracted sheet.
    pub sheets: Vec<(String, String)>,
}

/// State threaded through the stages.
#[derive(Debug)]
pub struct BuildState {
    pub graph: ModuleGraph,
    pub sheets: Vec<ExtractedSheet>,
    pub plan: Option<ChunkPlan>,
    pub rendered: Option<RenderedOutputs>,
    pub outputs: OutputSet,
}

impl BuildState {
    pub fn new(graph: ModuleGraph) -> Self {
        Self {
            graph,
            sheets: Vec::new(),
            plan: None,
            rendered: None,
            outputs: OutputSet::new(),
        }
    }
}

pub struct ProductionPipeline<'d> {
    descriptor: &'d BuildDescriptor,
}

impl<'d> ProductionPipeline<'d> {
    pub fn new(descriptor: &'d BuildDescriptor) -> Self {
        Self { descriptor }
    }

    /// Run every enabled stage over the engine's graph.
    ///
    /// # Errors
    ///
    /// `Error::Diagnostics` if the engine reported errors, `Error::Stage` for
    /// the first stage that fails.
    pub fn run(&self, engine: EngineOutput) -> Result<BuildArtifacts> {
        if engine.has_errors() {
            return Err(Error::Diagnostics(engine.errors().cloned().collect()));
        }
        let EngineOutput {
            graph,
            diagnostics,
            duration,
        } = engine;
        let started = Instant::now();
        let mut state = BuildState::new(graph);

        for stage in self.descriptor.optimization_stages() {
            if !stage.enabled(&self.descriptor.flags) {
                tracing::debug!(stage = %stage.kind(), "stage disabled, skipping");
                continue;
            }
            let stage_started = Instant::now();
            self.run_stage(&mut state, &stage.stage)
                .map_err(|message| Error::stage(stage.kind(), message))?;
            tracing::debug!(
                stage = %stage.kind(),
                elapsed_ms = stage_started.elapsed().as_millis() as u64,
                "stage complete"
            );
        }

        let chunks = summarize(&state);
        Ok(BuildArtifacts {
            module_count: state.graph.len(),
            outputs: state.outputs,
            chunks,
            diagnostics,
            duration: duration + started.elapsed(),
        })
    }

    fn run_stage(&self, state: &mut BuildState, stage: &Stage) -> StageResult {
        let descriptor = self.descriptor;
        match stage {
            Stage::ExtractStyles(opts) => styles::extract(state, opts),
            Stage::DedupeStyles(opts) => styles::dedupe(state, opts),
            Stage::Minify(opts) => minify::run(state, opts),
            Stage::HashModuleIds(opts) => ids::run(state, opts, descriptor),
            Stage::ConcatenateModules => concat::run(state),
            Stage::SplitChunks(opts) => split::run(state, opts, descriptor),
            Stage::NameOutputs(opts) => naming::run(state, opts, descriptor),
            Stage::EmitHtml(opts) => html::run(state, opts, descriptor),
            Stage::Compress(opts) => compress::run(state, opts),
            Stage::Analyze(opts) => analyze::run(state, opts),
        }
    }
}

pub(super) fn summarize(state: &BuildState) -> Vec<ChunkSummary> {
    let Some(rendered) = &state.rendered else {
        return Vec::new();
    };
    rendered
        .chunks
        .iter()
        .map(|chunk| ChunkSummary {
            id: chunk.id.clone(),
            kind: chunk.kind,
            file: chunk.file.clone(),
            size: state.outputs.get(&chunk.file).map_or(0, |f| f.size()),
            modules: chunk.modules.clone(),
        })
        .collect()
}

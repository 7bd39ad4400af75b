//! # kiln-pipeline
//!
//! Module graph construction, transforms and output rendering for kiln.
//!
//! A build runs in two halves:
//!
//! 1. a [`BundlingEngine`] resolves every module reachable from the entry
//!    points and runs the transform chain the rule registry assigns to it,
//!    producing a [`ModuleGraph`];
//! 2. the graph is rendered, either directly ([`dev::render_development`])
//!    or through the production [`ProductionPipeline`].
//!
//! ```no_run
//! use std::path::Path;
//! use kiln_config::{describe, BuildMode, ProjectConfig};
//! use kiln_pipeline::{build, NativeEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = describe(&ProjectConfig::default(), Path::new("."), BuildMode::Production)?;
//! let artifacts = build(&NativeEngine::new(), &descriptor)?;
//! artifacts.outputs.publish(&descriptor.output_root)?;
//! # Ok(()) }
//! ```

pub mod dev;
pub mod engine;
pub mod error;
pub mod graph;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod scan;
pub mod syntax;
pub mod transform;

use kiln_config::{BuildDescriptor, BuildMode};

pub use engine::{BundlingEngine, EngineOutput, NativeEngine};
pub use error::{Diagnostic, DiagnosticKind, Error, Result, Severity, TransformError};
pub use graph::{ImportKind, Module, ModuleGraph, ModuleId, ModuleKind, StyleSink};
pub use output::{ArtifactKind, BuildArtifacts, ChunkKind, ChunkSummary, OutputFile, OutputSet};
pub use pipeline::{minify_script, ProductionPipeline};
pub use syntax::SyntaxError;
pub use transform::{SourceModule, Transformer, TransformerSet};

/// Build the descriptor's entry points with `engine` and render the result
/// for the descriptor's mode.
///
/// Nothing is written to disk; see [`OutputSet::publish`].
///
/// # Errors
///
/// `Error::Diagnostics` when any module failed to resolve or transform, or
/// the error of the first failing production stage.
pub fn build(engine: &dyn BundlingEngine, descriptor: &BuildDescriptor) -> Result<BuildArtifacts> {
    tracing::info!(
        engine = engine.name(),
        mode = descriptor.mode.as_str(),
        entries = descriptor.entry_points.len(),
        "starting build"
    );
    let output = engine.build(descriptor)?;
    for warning in output.warnings() {
        tracing::warn!("{warning}");
    }
    if output.has_errors() {
        return Err(Error::Diagnostics(output.errors().cloned().collect()));
    }

    let artifacts = match descriptor.mode {
        BuildMode::Production => ProductionPipeline::new(descriptor).run(output)?,
        BuildMode::Development => dev::render_development(output, descriptor)?,
    };
    tracing::info!(
        files = artifacts.outputs.len(),
        modules = artifacts.module_count,
        elapsed_ms = artifacts.duration.as_millis() as u64,
        "build finished"
    );
    Ok(artifacts)
}

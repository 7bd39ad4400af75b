//! Development output.
//!
//! No optimization stages run. Each entry becomes one unhashed script holding
//! its whole import closure, styles are injected at runtime and dynamic
//! imports resolve from modules that are already installed.

use std::time::Instant;

use indexmap::IndexMap;
use kiln_config::{BuildDescriptor, OutputKind, TemplateVars};

use crate::engine::EngineOutput;
use crate::error::{Error, Result};
use crate::graph::StyleSink;
use crate::output::{ArtifactKind, BuildArtifacts, ChunkKind, ChunkSummary, OutputSet};
use crate::pipeline::{document_template, inject_tags};
use crate::render::{render_chunk, render_runtime, ModuleRenderer};

pub const RUNTIME_FILE: &str = "runtime.js";

/// Render the engine's graph as development bundles.
///
/// # Errors
///
/// `Error::Diagnostics` if the engine reported errors, `Error::Io` if the
/// document template cannot be read.
pub fn render_development(engine: EngineOutput, descriptor: &BuildDescriptor) -> Result<BuildArtifacts> {
    if engine.has_errors() {
        return Err(Error::Diagnostics(engine.errors().cloned().collect()));
    }
    let started = Instant::now();
    let EngineOutput {
        mut graph,
        diagnostics,
        duration,
    } = engine;

    for module in graph.modules_mut() {
        if module.style.is_some() {
            module.style_sink = StyleSink::Inject;
        }
    }

    let mut outputs = OutputSet::new();
    let mut chunks = Vec::new();
    let runtime = render_runtime(&IndexMap::new());
    chunks.push(ChunkSummary {
        id: "runtime".to_string(),
        kind: ChunkKind::Manifest,
        file: RUNTIME_FILE.to_string(),
        size: runtime.len(),
        modules: Vec::new(),
    });
    outputs.insert(RUNTIME_FILE, runtime, ArtifactKind::Script);

    let resolver = descriptor.path_resolver();
    let renderer = ModuleRenderer::eager(&graph);
    for (name, &entry) in graph.entries() {
        let closure = graph.full_closure(entry);
        let factories = closure
            .iter()
            .map(|id| -> Result<(String, String)> {
                Ok((graph.module(*id).public_id.clone(), renderer.factory(*id)?))
            })
            .collect::<Result<Vec<(String, String)>>>()?;
        let deferred = vec![vec![graph.module(entry).public_id.clone(), name.clone()]];
        let source = render_chunk(&[name.as_str()], &factories, &deferred);
        let file = resolver.name(
            OutputKind::Script,
            &TemplateVars {
                name,
                id: name,
                ..Default::default()
            },
        );
        chunks.push(ChunkSummary {
            id: name.clone(),
            kind: ChunkKind::Entry,
            file: file.clone(),
            size: source.len(),
            modules: factories.into_iter().map(|(id, _)| id).collect(),
        });
        outputs.insert(file, source, ArtifactKind::Script);
    }

    for module in graph.modules() {
        if let Some(emitted) = &module.emitted {
            outputs.insert(
                emitted.file_name.clone(),
                emitted.contents.clone(),
                ArtifactKind::Asset,
            );
        }
    }

    let scripts: Vec<String> = chunks
        .iter()
        .map(|chunk| descriptor.public_url(&chunk.file))
        .collect();
    let html = inject_tags(&document_template(descriptor)?, &[], &scripts);
    outputs.insert(descriptor.html_filename.clone(), html, ArtifactKind::Document);

    Ok(BuildArtifacts {
        module_count: graph.len(),
        outputs,
        chunks,
        diagnostics,
        duration: duration + started.elapsed(),
    })
}

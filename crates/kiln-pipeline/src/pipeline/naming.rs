use indexmap::IndexMap;
use kiln_config::paths::{self, TemplateVars};
use kiln_config::stage::NameOutputsOptions;
use kiln_config::BuildDescriptor;

use super::split::{Chunk, ChunkPlan};
use super::{BuildState, RenderedChunk, RenderedOutputs, StageResult};
use crate::graph::ModuleGraph;
use crate::output::{ArtifactKind, ChunkKind};
use crate::render::{render_chunk, render_runtime, ModuleRenderer};
use crate::syntax::SyntaxError;
use crate::transform::json_string;

const CHUNK_HASH_LENGTH: usize = 20;

fn chunk_hash(contents: &[u8]) -> String {
    let hex = blake3::hash(contents).to_hex();
    hex.as_str()[..CHUNK_HASH_LENGTH].to_string()
}

/// Render every chunk, name it from its content hash and add it to the
/// output set. The runtime manifest is rendered last since it embeds the
/// final URLs of the async chunks.
pub(super) fn run(
    state: &mut BuildState,
    opts: &NameOutputsOptions,
    descriptor: &BuildDescriptor,
) -> StageResult {
    let plan = state
        .plan
        .as_ref()
        .ok_or("split-chunks must run before name-outputs")?;
    let graph = &state.graph;

    let renderer = ModuleRenderer::new(graph, |target| {
        let required = plan.required_chunks(graph, target);
        format!(
            "__kiln_require__.load({}).then(function () {{ return __kiln_require__({}); }})",
            serde_json::to_string(&required).unwrap_or_else(|_| "[]".to_string()),
            json_string(&graph.module(target).public_id)
        )
    });

    let mut rendered = RenderedOutputs::default();
    let mut async_urls = IndexMap::new();
    let mut manifest = None;

    for chunk in &plan.chunks {
        if chunk.kind == ChunkKind::Manifest {
            manifest = Some(chunk);
            continue;
        }
        let source = render_plan_chunk(chunk, plan, graph, &renderer)?;
        let hash = chunk_hash(source.as_bytes());
        let template = if chunk.kind.is_async() {
            &opts.async_script
        } else {
            &opts.script
        };
        let file = paths::render(
            template,
            &TemplateVars {
                name: &chunk.id,
                id: &chunk.id,
                hash: &hash,
                ..Default::default()
            },
        );
        if chunk.kind.is_async() {
            async_urls.insert(chunk.id.clone(), descriptor.public_url(&file));
        }
        state.outputs.insert(file.clone(), source, ArtifactKind::Script);
        rendered.chunks.push(rendered_chunk(chunk, file, graph));
    }

    let manifest = manifest.ok_or("chunk plan has no runtime manifest")?;
    let mut source = render_runtime(&async_urls);
    if !manifest.modules.is_empty() {
        source.push_str(&render_plan_chunk(manifest, plan, graph, &renderer)?);
    }
    let file = paths::render(
        &opts.script,
        &TemplateVars {
            name: &manifest.id,
            id: &manifest.id,
            hash: &chunk_hash(source.as_bytes()),
            ..Default::default()
        },
    );
    state.outputs.insert(file.clone(), source, ArtifactKind::Script);
    rendered.chunks.push(rendered_chunk(manifest, file, graph));

    for sheet in &state.sheets {
        let file = paths::render(
            &sheet.filename_template,
            &TemplateVars {
                name: &sheet.entry,
                id: &sheet.entry,
                ext: "css",
                hash: &chunk_hash(sheet.css.as_bytes()),
            },
        );
        state
            .outputs
            .insert(file.clone(), sheet.css.clone(), ArtifactKind::Style);
        rendered.sheets.push((sheet.entry.clone(), file));
    }

    for module in graph.modules() {
        if let Some(emitted) = &module.emitted {
            if !state.outputs.contains(&emitted.file_name) {
                state.outputs.insert(
                    emitted.file_name.clone(),
                    emitted.contents.clone(),
                    ArtifactKind::Asset,
                );
            }
        }
    }

    tracing::debug!(chunks = rendered.chunks.len(), sheets = rendered.sheets.len(), "outputs named");
    state.rendered = Some(rendered);
    Ok(())
}

fn render_plan_chunk(
    chunk: &Chunk,
    plan: &ChunkPlan,
    graph: &ModuleGraph,
    renderer: &ModuleRenderer<'_>,
) -> Result<String, String> {
    let factories = chunk
        .modules
        .iter()
        .map(|id| -> Result<(String, String), SyntaxError> {
            Ok((graph.module(*id).public_id.clone(), renderer.factory(*id)?))
        })
        .collect::<Result<Vec<(String, String)>, SyntaxError>>()
        .map_err(|e| e.to_string())?;

    let deferred: Vec<Vec<String>> = chunk
        .entry_module
        .map(|entry| {
            let mut row = vec![graph.module(entry).public_id.clone()];
            row.extend(plan.required_chunks(graph, entry));
            vec![row]
        })
        .unwrap_or_default();

    Ok(render_chunk(&[chunk.id.as_str()], &factories, &deferred))
}

fn rendered_chunk(chunk: &Chunk, file: String, graph: &ModuleGraph) -> RenderedChunk {
    RenderedChunk {
        id: chunk.id.clone(),
        kind: chunk.kind,
        file,
        modules: chunk
            .modules
            .iter()
            .map(|id| graph.module(*id).public_id.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::graph_of;
    use crate::transform::tests::descriptor;
    use kiln_config::stage::SplitChunksOptions;
    use kiln_config::{BuildMode, ChunkSplitPolicy};
    use std::path::Path;

    fn named_state() -> BuildState {
        let mut graph = graph_of(&[
            (
                "/app/src/main.js",
                &[("/app/node_modules/lib/index.js", false), ("/app/src/page.js", true)],
            ),
            ("/app/node_modules/lib/index.js", &[]),
            ("/app/src/page.js", &[]),
        ]);
        let main = graph.id_of(Path::new("/app/src/main.js")).unwrap();
        graph.add_entry("app", main);
        for module in graph.modules_mut() {
            module.code = "export default 1;".to_string();
        }
        graph.module_mut(main).code =
            "import lib from './/app/node_modules/lib/index.js';\nimport('.//app/src/page.js');".to_string();
        let descriptor = descriptor(BuildMode::Production);
        let mut state = BuildState::new(graph);
        super::super::split::run(
            &mut state,
            &SplitChunksOptions {
                vendor: ChunkSplitPolicy::vendor(),
                runtime: ChunkSplitPolicy::runtime_manifest(),
                shared_async: ChunkSplitPolicy::shared_async(3),
            },
            &descriptor,
        )
        .unwrap();
        run(
            &mut state,
            &NameOutputsOptions {
                script: "static/js/[name].[chunkhash].js".into(),
                async_script: "static/js/[id].[chunkhash].js".into(),
            },
            &descriptor,
        )
        .unwrap();
        state
    }

    #[test]
    fn manifest_is_rendered_last_with_async_urls() {
        let state = named_state();
        let rendered = state.rendered.as_ref().unwrap();
        let ids: Vec<_> = rendered.chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["vendor", "app", "/app/src/page.js", "manifest"]);

        let manifest = &rendered.chunks[3];
        assert!(manifest.file.starts_with("static/js/manifest."));
        let source = String::from_utf8(state.outputs.get(&manifest.file).unwrap().contents.clone()).unwrap();
        let page = &rendered.chunks[2];
        assert!(source.contains(&page.file));
    }

    #[test]
    fn entry_chunk_defers_until_vendor_is_installed() {
        let state = named_state();
        let rendered = state.rendered.as_ref().unwrap();
        let app = rendered.chunks.iter().find(|c| c.id == "app").unwrap();
        let source = String::from_utf8(state.outputs.get(&app.file).unwrap().contents.clone()).unwrap();
        assert!(source.contains(r#"[["/app/src/main.js","vendor","app"]]"#));
        assert!(source.contains("__kiln_require__.load([\"/app/src/page.js\"])"));
    }

    #[test]
    fn chunk_hashes_are_twenty_hex_digits() {
        let state = named_state();
        let vendor = &state.rendered.as_ref().unwrap().chunks[0];
        let hash = vendor
            .file
            .trim_start_matches("static/js/vendor.")
            .trim_end_matches(".js");
        assert_eq!(hash.len(), CHUNK_HASH_LENGTH);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn missing_plan_is_an_error() {
        let mut state = BuildState::new(ModuleGraph::new());
        let err = run(
            &mut state,
            &NameOutputsOptions {
                script: String::new(),
                async_script: String::new(),
            },
            &descriptor(BuildMode::Production),
        )
        .unwrap_err();
        assert!(err.contains("split-chunks"));
    }
}

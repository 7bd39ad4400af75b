//! Bundle analysis: a machine-readable `stats.json` and a static
//! `report.html` listing every chunk with its size and modules.

use kiln_config::stage::AnalyzeOptions;
use serde::Serialize;

use super::{summarize, BuildState, StageResult};
use crate::output::{ArtifactKind, ChunkSummary};

#[derive(Debug, Serialize)]
struct Stats<'a> {
    total_size: usize,
    module_count: usize,
    chunks: &'a [ChunkSummary],
    assets: Vec<AssetStat<'a>>,
}

#[derive(Debug, Serialize)]
struct AssetStat<'a> {
    path: &'a str,
    kind: ArtifactKind,
    size: usize,
}

pub(super) fn run(state: &mut BuildState, opts: &AnalyzeOptions) -> StageResult {
    let chunks = summarize(state);
    let stats = Stats {
        total_size: state.outputs.total_size(),
        module_count: state.graph.len(),
        chunks: &chunks,
        assets: state
            .outputs
            .iter()
            .map(|file| AssetStat {
                path: &file.path,
                kind: file.kind,
                size: file.size(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&stats).map_err(|e| format!("stats: {e}"))?;
    let report = render_report(&stats);

    state
        .outputs
        .insert(opts.stats_filename.clone(), json, ArtifactKind::Report);
    state
        .outputs
        .insert(opts.report_filename.clone(), report, ArtifactKind::Report);
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn human_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

fn render_report(stats: &Stats<'_>) -> String {
    let mut rows = String::new();
    for chunk in stats.chunks {
        let modules: String = chunk
            .modules
            .iter()
            .map(|m| format!("<li><code>{}</code></li>", escape(m)))
            .collect();
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><ul>{modules}</ul></td></tr>\n",
            escape(&chunk.id),
            serde_json::to_value(chunk.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            escape(&chunk.file),
            human_size(chunk.size),
        ));
    }

    let mut assets = String::new();
    for asset in &stats.assets {
        assets.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape(asset.path),
            human_size(asset.size)
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>kiln bundle report</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; width: 100%; margin-bottom: 2em; }}
td, th {{ border: 1px solid #ddd; padding: 4px 8px; text-align: left; vertical-align: top; }}
ul {{ margin: 0; padding-left: 1.2em; }}
</style>
</head>
<body>
<h1>Bundle report</h1>
<p>{} modules, {} total</p>
<h2>Chunks</h2>
<table>
<tr><th>Chunk</th><th>Kind</th><th>File</th><th>Size</th><th>Modules</th></tr>
{rows}</table>
<h2>Files</h2>
<table>
<tr><th>Path</th><th>Size</th></tr>
{assets}</table>
</body>
</html>
"#,
        stats.module_count,
        human_size(stats.total_size),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ModuleGraph;
    use crate::output::ChunkKind;
    use crate::pipeline::{RenderedChunk, RenderedOutputs};

    #[test]
    fn writes_stats_and_report() {
        let mut state = BuildState::new(ModuleGraph::new());
        state
            .outputs
            .insert("js/app.abc.js", "var a = 1;", ArtifactKind::Script);
        state.rendered = Some(RenderedOutputs {
            chunks: vec![RenderedChunk {
                id: "app".into(),
                kind: ChunkKind::Entry,
                file: "js/app.abc.js".into(),
                modules: vec!["1a2b".into()],
            }],
            sheets: Vec::new(),
        });
        run(
            &mut state,
            &AnalyzeOptions {
                report_filename: "report.html".into(),
                stats_filename: "stats.json".into(),
            },
        )
        .unwrap();

        let stats: serde_json::Value =
            serde_json::from_slice(&state.outputs.get("stats.json").unwrap().contents).unwrap();
        assert_eq!(stats["chunks"][0]["id"], "app");
        assert_eq!(stats["chunks"][0]["kind"], "entry");
        assert_eq!(stats["chunks"][0]["size"], 10);
        assert_eq!(stats["assets"][0]["path"], "js/app.abc.js");

        let report = String::from_utf8(state.outputs.get("report.html").unwrap().contents.clone()).unwrap();
        assert!(report.contains("<code>1a2b</code>"));
        assert_eq!(state.outputs.get("report.html").unwrap().kind, ArtifactKind::Report);
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.00 KiB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.00 MiB");
    }
}

//! Style extraction and deduplication.

use kiln_config::stage::{DedupeStylesOptions, ExtractStylesOptions};
use rustc_hash::FxHashSet;

use super::{BuildState, ExtractedSheet, StageResult};
use crate::graph::StyleSink;
use crate::transform::normalize_css;

/// Gather extractable styles reachable from each entry into one sheet per
/// entry, in dependency order.
pub(super) fn extract(state: &mut BuildState, opts: &ExtractStylesOptions) -> StageResult {
    let graph = &state.graph;
    let mut included = FxHashSet::default();
    let mut sheets = Vec::new();

    for (name, &entry) in graph.entries() {
        let closure = if opts.all_chunks {
            graph.full_closure(entry)
        } else {
            graph.static_closure(entry)
        };

        let mut parts = Vec::new();
        let mut modules = Vec::new();
        for id in closure {
            let module = graph.module(id);
            if module.style_sink != StyleSink::Extract {
                continue;
            }
            if let Some(css) = module.style.as_deref().filter(|css| !css.trim().is_empty()) {
                parts.push(css);
                modules.push(id);
                included.insert(id);
            }
        }

        if !parts.is_empty() {
            sheets.push(ExtractedSheet {
                entry: name.clone(),
                css: parts.join("\n"),
                filename_template: opts.filename.clone(),
                modules,
            });
        }
    }

    // Styles only reachable through async chunks stay with their module.
    for module in state.graph.modules_mut() {
        if module.style_sink == StyleSink::Extract
            && module.style.is_some()
            && !included.contains(&module.id)
        {
            module.style_sink = StyleSink::Inject;
        }
    }

    tracing::debug!(sheets = sheets.len(), "styles extracted");
    state.sheets = sheets;
    Ok(())
}

/// Merge duplicate rules within each sheet.
pub(super) fn dedupe(state: &mut BuildState, opts: &DedupeStylesOptions) -> StageResult {
    for sheet in &mut state.sheets {
        let before = sheet.css.len();
        sheet.css = normalize_css(&sheet.css, &sheet.entry, true)
            .map_err(|e| format!("sheet '{}': {e}", sheet.entry))?;
        tracing::trace!(
            entry = %sheet.entry,
            safe = opts.safe,
            before,
            after = sheet.css.len(),
            "sheet deduplicated"
        );
    }
    Ok(())
}

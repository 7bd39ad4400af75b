use super::{BuildState, StageResult};
use crate::graph::{ImportKind, ModuleGraph, ModuleId};

/// Fold modules with exactly one static importer into that importer.
///
/// Vendor modules, entries and dynamic-import targets keep their own
/// factory, as does any module whose import closure leads back to its
/// importer.
pub(super) fn run(state: &mut BuildState) -> StageResult {
    let candidates: Vec<(ModuleId, ModuleId)> = {
        let graph = &state.graph;
        graph
            .ids()
            .filter_map(|id| sole_importer(graph, id).map(|parent| (id, parent)))
            .collect()
    };

    let graph = &mut state.graph;
    let mut merged = 0;
    for (child, parent) in candidates {
        let mut cursor = Some(parent);
        let mut cycle = false;
        while let Some(current) = cursor {
            if current == child {
                cycle = true;
                break;
            }
            cursor = graph.module(current).concatenated_into;
        }
        if cycle {
            continue;
        }
        graph.module_mut(child).concatenated_into = Some(parent);
        merged += 1;
    }
    tracing::debug!(merged, "modules concatenated");
    Ok(())
}

fn sole_importer(graph: &ModuleGraph, id: ModuleId) -> Option<ModuleId> {
    let module = graph.module(id);
    if module.is_entry || module.is_vendor {
        return None;
    }

    let mut parent = None;
    for (importer, kind) in graph.importers_of(id) {
        if kind == ImportKind::Dynamic {
            return None;
        }
        match parent {
            None => parent = Some(importer),
            Some(existing) if existing == importer => {}
            Some(_) => return None,
        }
    }

    let parent = parent?;
    if graph.module(parent).is_vendor || graph.static_closure(id).contains(&parent) {
        return None;
    }
    Some(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::graph_of;
    use std::path::Path;

    fn concatenated(graph: &ModuleGraph, path: &str) -> Option<String> {
        let id = graph.id_of(Path::new(path)).unwrap();
        graph
            .module(id)
            .concatenated_into
            .map(|p| graph.module(p).path.display().to_string())
    }

    #[test]
    fn single_importer_modules_are_folded() {
        let mut graph = graph_of(&[
            ("main", &[("a", false), ("shared", false), ("lazy", true)]),
            ("a", &[("shared", false), ("leaf", false)]),
            ("shared", &[]),
            ("leaf", &[]),
            ("lazy", &[]),
        ]);
        let main = graph.id_of(Path::new("main")).unwrap();
        graph.add_entry("app", main);
        let mut state = BuildState::new(graph);
        run(&mut state).unwrap();

        let graph = &state.graph;
        assert_eq!(concatenated(graph, "a").as_deref(), Some("main"));
        assert_eq!(concatenated(graph, "leaf").as_deref(), Some("a"));
        assert_eq!(concatenated(graph, "shared"), None);
        assert_eq!(concatenated(graph, "lazy"), None);
        assert_eq!(concatenated(graph, "main"), None);
        let leaf = graph.id_of(Path::new("leaf")).unwrap();
        assert_eq!(graph.render_root(leaf), main);
    }

    #[test]
    fn cycles_are_left_alone() {
        let mut graph = graph_of(&[
            ("main", &[("a", false)]),
            ("a", &[("b", false)]),
            ("b", &[("a", false)]),
        ]);
        let main = graph.id_of(Path::new("main")).unwrap();
        graph.add_entry("app", main);
        let mut state = BuildState::new(graph);
        run(&mut state).unwrap();
        assert_eq!(concatenated(&state.graph, "b"), None);
    }
}

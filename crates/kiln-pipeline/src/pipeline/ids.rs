use kiln_config::stage::HashModuleIdsOptions;
use kiln_config::BuildDescriptor;
use rustc_hash::FxHashSet;

use super::{BuildState, StageResult};
use crate::engine::relative_id;

/// Replace module ids with a short digest of the project-relative path.
///
/// Ids depend only on where a module lives, so adding or editing other
/// modules never renames it. On a prefix collision the later path (in
/// sorted order) gets a longer digest.
pub(super) fn run(
    state: &mut BuildState,
    opts: &HashModuleIdsOptions,
    descriptor: &BuildDescriptor,
) -> StageResult {
    let graph = &mut state.graph;
    let mut order: Vec<_> = graph
        .modules()
        .map(|m| (relative_id(&m.path, &descriptor.context), m.id))
        .collect();
    order.sort();

    let mut used = FxHashSet::default();
    for (relative, id) in order {
        let hex = blake3::hash(relative.as_bytes()).to_hex();
        let hex = hex.as_str();
        let mut len = opts.digest_length.clamp(1, hex.len());
        while used.contains(&hex[..len]) && len < hex.len() {
            len += 1;
        }
        let public_id = hex[..len].to_string();
        used.insert(public_id.clone());
        graph.module_mut(id).public_id = public_id;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ModuleGraph, ModuleKind};
    use crate::transform::tests::descriptor;
    use kiln_config::BuildMode;
    use std::path::PathBuf;

    fn ids_for(paths: &[&str]) -> Vec<String> {
        let mut graph = ModuleGraph::new();
        for path in paths {
            graph.add_module(PathBuf::from(path), ModuleKind::Script);
        }
        let mut state = BuildState::new(graph);
        run(
            &mut state,
            &HashModuleIdsOptions { digest_length: 4 },
            &descriptor(BuildMode::Production),
        )
        .unwrap();
        state.graph.modules().map(|m| m.public_id.clone()).collect()
    }

    #[test]
    fn ids_are_short_and_path_derived() {
        let first = ids_for(&["/app/src/a.js", "/app/src/b.js"]);
        let second = ids_for(&["/app/src/new.js", "/app/src/a.js", "/app/src/b.js"]);
        assert_eq!(first[0].len(), 4);
        assert_eq!(first[0], second[1]);
        assert_eq!(first[1], second[2]);
    }

    #[test]
    fn ids_are_unique() {
        let paths: Vec<String> = (0..500).map(|i| format!("/app/src/m{i}.js")).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let ids = ids_for(&refs);
        let unique: FxHashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}

//! Script rendering shared by development and production output.

mod lower;
mod runtime;

use crate::graph::{ModuleGraph, ModuleId, StyleSink};
use crate::syntax::SyntaxError;
use crate::transform::json_string;

pub use runtime::{render_runtime, CHUNK_QUEUE};

use lower::{lower, Linker};

/// Local variable holding a concatenated module's exports.
fn local_name(id: ModuleId) -> String {
    format!("__kiln_m{}__", id.index())
}

/// Renders module factories, inlining concatenated modules into the
/// factory of the module that imports them.
pub struct ModuleRenderer<'g> {
    graph: &'g ModuleGraph,
    dynamic: Box<dyn Fn(ModuleId) -> String + 'g>,
}

struct ModuleLinker<'r, 'g> {
    renderer: &'r ModuleRenderer<'g>,
    from: ModuleId,
}

impl ModuleLinker<'_, '_> {
    fn target(&self, specifier: &str) -> Option<ModuleId> {
        self.renderer
            .graph
            .module(self.from)
            .dependencies
            .iter()
            .find(|d| d.specifier == specifier)
            .map(|d| d.target)
    }
}

impl Linker for ModuleLinker<'_, '_> {
    fn exports_of(&self, specifier: &str) -> Option<String> {
        self.target(specifier).map(|t| self.renderer.exports_expr(t))
    }

    fn load(&self, specifier: &str) -> Option<String> {
        self.target(specifier).map(|t| (self.renderer.dynamic)(t))
    }
}

impl<'g> ModuleRenderer<'g> {
    /// `dynamic` renders the promise expression for an `import()` of a module.
    pub fn new(graph: &'g ModuleGraph, dynamic: impl Fn(ModuleId) -> String + 'g) -> Self {
        Self {
            graph,
            dynamic: Box::new(dynamic),
        }
    }

    /// Renderer whose dynamic imports resolve from already-installed modules.
    pub fn eager(graph: &'g ModuleGraph) -> Self {
        Self::new(graph, move |target| {
            format!(
                "Promise.resolve().then(function () {{ return __kiln_require__({}); }})",
                json_string(&graph.module(target).public_id)
            )
        })
    }

    fn exports_expr(&self, target: ModuleId) -> String {
        let module = self.graph.module(target);
        if module.concatenated_into.is_some() {
            local_name(target)
        } else {
            format!("__kiln_require__({})", json_string(&module.public_id))
        }
    }

    /// `function (module, exports, __kiln_require__) { ... }` for `id`.
    ///
    /// # Errors
    ///
    /// `SyntaxError` naming the module whose code does not parse.
    pub fn factory(&self, id: ModuleId) -> Result<String, SyntaxError> {
        Ok(format!(
            "function (module, exports, __kiln_require__) {{\n{}\n}}",
            self.body(id)?
        ))
    }

    fn body(&self, id: ModuleId) -> Result<String, SyntaxError> {
        let module = self.graph.module(id);
        let mut out = String::new();
        for child in self.graph.inlined_children(id) {
            out.push_str(&format!(
                "var {} = (function () {{\nvar module = {{ exports: {{}} }}, exports = module.exports;\n{}\nreturn module.exports;\n}})();\n",
                local_name(child),
                self.body(child)?
            ));
        }
        if module.style_sink == StyleSink::Inject {
            if let Some(css) = module.style.as_deref().filter(|css| !css.is_empty()) {
                out.push_str(&format!("__kiln_require__.css({});\n", json_string(css)));
            }
        }
        let lowered = lower(
            &module.code,
            &ModuleLinker {
                renderer: self,
                from: id,
            },
        )
        .map_err(|e| e.in_module(&module.public_id))?;
        out.push_str(&lowered);
        Ok(out)
    }
}

/// One chunk file: registers `factories` under `chunk_ids` and schedules
/// `deferred` entries, each `[module id, required chunk ids...]`.
pub fn render_chunk(
    chunk_ids: &[&str],
    factories: &[(String, String)],
    deferred: &[Vec<String>],
) -> String {
    let ids = serde_json::to_string(chunk_ids).unwrap_or_else(|_| "[]".to_string());
    let mut out = format!("({CHUNK_QUEUE} = {CHUNK_QUEUE} || []).push([{ids}, {{\n");
    let table: Vec<String> = factories
        .iter()
        .map(|(id, factory)| format!("{}: {factory}", json_string(id)))
        .collect();
    out.push_str(&table.join(",\n"));
    out.push_str("\n}");
    if !deferred.is_empty() {
        let deferred = serde_json::to_string(deferred).unwrap_or_else(|_| "[]".to_string());
        out.push_str(", ");
        out.push_str(&deferred);
    }
    out.push_str("]);\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::graph_of;
    use std::path::Path;

    #[test]
    fn concatenated_modules_render_inside_their_importer() {
        let mut graph = graph_of(&[("main", &[("util", false)]), ("util", &[])]);
        let main = graph.id_of(Path::new("main")).unwrap();
        let util = graph.id_of(Path::new("util")).unwrap();
        graph.module_mut(main).code = "import { a } from './util'\nconsole.log(a)".into();
        graph.module_mut(util).code = "export const a = 1".into();
        graph.module_mut(util).concatenated_into = Some(main);

        let factory = ModuleRenderer::eager(&graph).factory(main).unwrap();
        assert!(factory.starts_with("function (module, exports, __kiln_require__) {\nvar __kiln_m1__ = (function () {"));
        assert!(factory.contains("var __kiln_import_1__ = __kiln_m1__;"));
        assert!(!factory.contains("__kiln_require__(\"util\")"));
    }

    #[test]
    fn standalone_modules_are_required_by_public_id() {
        let mut graph = graph_of(&[("main", &[("lazy", true)]), ("lazy", &[])]);
        let main = graph.id_of(Path::new("main")).unwrap();
        graph.module_mut(main).code = "const l = () => import('./lazy')".into();
        let factory = ModuleRenderer::eager(&graph).factory(main).unwrap();
        assert!(factory.contains("return __kiln_require__(\"lazy\");"));
    }

    #[test]
    fn chunk_format_carries_deferred_entries() {
        let chunk = render_chunk(
            &["app"],
            &[("a1".into(), "function () {}".into())],
            &[vec!["a1".into(), "app".into()]],
        );
        assert_eq!(
            chunk,
            "(self.kilnChunks = self.kilnChunks || []).push([[\"app\"], {\n\"a1\": function () {}\n}, [[\"a1\",\"app\"]]]);\n"
        );
    }
}

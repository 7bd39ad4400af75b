//! Rewrite ES module syntax into the factory form the runtime evaluates.
//!
//! Each module body runs as `function (module, exports, __kiln_require__)`.
//! Import declarations become `var` bindings over the target's exports and
//! export declarations become assignments to `exports`. Edits are spliced
//! into the source at AST spans, so minified and commented code lower alike.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, BindingPatternKind, CallExpression, Declaration, ExportAllDeclaration,
    ExportDefaultDeclaration, ExportDefaultDeclarationKind, ExportNamedDeclaration,
    ImportDeclaration, ImportDeclarationSpecifier, ImportExpression, ModuleDeclaration,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::{GetSpan, Span};

use crate::syntax::{self, SyntaxError};
use crate::transform::json_string;

/// How specifiers map to expressions in the rendered output.
pub(crate) trait Linker {
    /// Expression for the exports of the module `specifier` resolves to.
    fn exports_of(&self, specifier: &str) -> Option<String>;

    /// Expression for a promise of those exports, for `import()`.
    fn load(&self, specifier: &str) -> Option<String>;
}

fn missing(specifier: &str) -> String {
    format!("__kiln_require__.x({})", json_string(specifier))
}

/// `object.name`, or `object["name"]` when `name` is not an identifier.
fn member(object: &str, name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric());
    if is_identifier {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", json_string(name))
    }
}

struct Edit {
    start: u32,
    end: u32,
    text: String,
}

struct Lowering<'l> {
    linker: &'l dyn Linker,
    edits: Vec<Edit>,
    /// `(exported, local)` pairs assigned once the body has run.
    exported: Vec<(String, String)>,
    counter: usize,
    is_esm: bool,
}

impl Lowering<'_> {
    fn replace(&mut self, span: Span, text: String) {
        self.replace_range(span.start, span.end, text);
    }

    fn replace_range(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
        });
    }

    fn exports_of(&self, specifier: &str) -> String {
        self.linker
            .exports_of(specifier)
            .unwrap_or_else(|| missing(specifier))
    }

    fn temp(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("__kiln_{prefix}_{}__", self.counter)
    }

    fn module_declaration(&mut self, declaration: &ModuleDeclaration<'_>) {
        match declaration {
            ModuleDeclaration::ImportDeclaration(import) => self.import(import),
            ModuleDeclaration::ExportNamedDeclaration(export) => self.export_named(export),
            ModuleDeclaration::ExportDefaultDeclaration(export) => self.export_default(export),
            ModuleDeclaration::ExportAllDeclaration(export) => self.export_all(export),
            _ => {}
        }
    }

    fn import(&mut self, import: &ImportDeclaration<'_>) {
        let source = self.exports_of(import.source.value.as_str());
        let specifiers = match &import.specifiers {
            Some(specifiers) if !specifiers.is_empty() => specifiers,
            _ => {
                self.replace(import.span, format!("{source};"));
                return;
            }
        };

        let tmp = self.temp("import");
        let mut out = format!("var {tmp} = {source};");
        for specifier in specifiers {
            let binding = match specifier {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                    format!("var {} = __kiln_require__.n({tmp});", default.local.name)
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                    format!("var {} = {tmp};", namespace.local.name)
                }
                ImportDeclarationSpecifier::ImportSpecifier(named) => {
                    let imported = syntax::export_name(&named.imported);
                    if imported == "default" {
                        format!("var {} = __kiln_require__.n({tmp});", named.local.name)
                    } else {
                        format!("var {} = {};", named.local.name, member(&tmp, &imported))
                    }
                }
            };
            out.push(' ');
            out.push_str(&binding);
        }
        self.replace(import.span, out);
    }

    fn export_named(&mut self, export: &ExportNamedDeclaration<'_>) {
        self.is_esm = true;
        if let Some(declaration) = &export.declaration {
            declared_names(declaration, &mut self.exported);
            self.replace_range(export.span.start, declaration.span().start, "");
            return;
        }

        let pairs: Vec<(String, String)> = export
            .specifiers
            .iter()
            .map(|s| (syntax::export_name(&s.local), syntax::export_name(&s.exported)))
            .collect();
        let text = match &export.source {
            Some(source) => {
                let source = self.exports_of(source.value.as_str());
                let tmp = self.temp("reexport");
                let mut out = format!("var {tmp} = {source};");
                for (local, exported) in &pairs {
                    out.push_str(&format!(" {} = {};", member("exports", exported), member(&tmp, local)));
                }
                out
            }
            None => pairs
                .iter()
                .map(|(local, exported)| format!("{} = {local};", member("exports", exported)))
                .collect::<Vec<_>>()
                .join(" "),
        };
        self.replace(export.span, text);
    }

    fn export_default(&mut self, export: &ExportDefaultDeclaration<'_>) {
        self.is_esm = true;
        let declaration = &export.declaration;
        let span = declaration.span();
        let (is_declaration, name) = match declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                (true, function.id.as_ref().map(|id| id.name.to_string()))
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                (true, class.id.as_ref().map(|id| id.name.to_string()))
            }
            _ => (false, None),
        };

        match name {
            Some(name) => {
                self.replace_range(export.span.start, span.start, "");
                self.exported.push(("default".to_string(), name));
            }
            None => {
                self.replace_range(export.span.start, span.start, "exports.default = ");
                // A declaration ends without a semicolon; as an expression it needs one.
                if is_declaration {
                    self.replace_range(span.end, span.end, ";");
                }
            }
        }
    }

    fn export_all(&mut self, export: &ExportAllDeclaration<'_>) {
        self.is_esm = true;
        let source = self.exports_of(export.source.value.as_str());
        let text = match &export.exported {
            Some(name) => format!("{} = {source};", member("exports", &syntax::export_name(name))),
            None => format!("__kiln_require__.r(exports, {source});"),
        };
        self.replace(export.span, text);
    }
}

impl<'a> Visit<'a> for Lowering<'_> {
    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        match syntax::literal_source(&it.source) {
            Some(specifier) => {
                let text = self.linker.load(&specifier).unwrap_or_else(|| {
                    format!(
                        "Promise.resolve().then(function () {{ return {}; }})",
                        missing(&specifier)
                    )
                });
                self.replace(it.span, text);
            }
            None => walk::walk_import_expression(self, it),
        }
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        match syntax::require_specifier(it) {
            Some(specifier) => {
                let text = self.exports_of(&specifier);
                self.replace(it.span, text);
            }
            None => walk::walk_call_expression(self, it),
        }
    }
}

fn declared_names(declaration: &Declaration<'_>, out: &mut Vec<(String, String)>) {
    match declaration {
        Declaration::VariableDeclaration(variables) => {
            for declarator in &variables.declarations {
                binding_names(&declarator.id, out);
            }
        }
        Declaration::FunctionDeclaration(function) => {
            if let Some(id) = &function.id {
                out.push((id.name.to_string(), id.name.to_string()));
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                out.push((id.name.to_string(), id.name.to_string()));
            }
        }
        _ => {}
    }
}

fn binding_names(pattern: &BindingPattern<'_>, out: &mut Vec<(String, String)>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => {
            out.push((id.name.to_string(), id.name.to_string()));
        }
        BindingPatternKind::ObjectPattern(object) => {
            for property in &object.properties {
                binding_names(&property.value, out);
            }
            if let Some(rest) = &object.rest {
                binding_names(&rest.argument, out);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                binding_names(element, out);
            }
            if let Some(rest) = &array.rest {
                binding_names(&rest.argument, out);
            }
        }
        BindingPatternKind::AssignmentPattern(assignment) => binding_names(&assignment.left, out),
    }
}

/// Apply non-overlapping edits in source order.
fn splice(code: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| (edit.start, edit.end));
    let mut out = String::with_capacity(code.len() + 64);
    let mut cursor = 0usize;
    for edit in edits {
        let (start, end) = (edit.start as usize, edit.end as usize);
        if start < cursor {
            continue;
        }
        out.push_str(&code[cursor..start]);
        out.push_str(&edit.text);
        cursor = end;
    }
    out.push_str(&code[cursor..]);
    out
}

/// Lower `code` against `linker`.
///
/// # Errors
///
/// `SyntaxError` when `code` does not parse.
pub(crate) fn lower(code: &str, linker: &dyn Linker) -> Result<String, SyntaxError> {
    let allocator = Allocator::default();
    let program = syntax::parse(&allocator, code)?;
    let mut lowering = Lowering {
        linker,
        edits: Vec::new(),
        exported: Vec::new(),
        counter: 0,
        is_esm: false,
    };
    for statement in &program.body {
        if let Some(declaration) = statement.as_module_declaration() {
            lowering.module_declaration(declaration);
        }
    }
    walk::walk_program(&mut lowering, &program);

    let mut out = String::with_capacity(code.len() + 64);
    if lowering.is_esm {
        out.push_str("exports.__esModule = true;\n");
    }
    out.push_str(splice(code, lowering.edits).trim_end());
    for (exported, local) in lowering.exported {
        out.push_str(&format!("\n{} = {local};", member("exports", &exported)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Linker for Fixed {
        fn exports_of(&self, specifier: &str) -> Option<String> {
            (specifier != "./missing").then(|| format!("R({specifier})"))
        }

        fn load(&self, specifier: &str) -> Option<String> {
            Some(format!("L({specifier})"))
        }
    }

    #[test]
    fn lowers_import_forms() {
        let out = lower(
            "import Vue from 'vue'\nimport * as util from './util'\nimport App, { a, b as c } from './App.vue'\nimport './style.css'\n",
            &Fixed,
        )
        .unwrap();
        assert_eq!(
            out,
            "var __kiln_import_1__ = R(vue); var Vue = __kiln_require__.n(__kiln_import_1__);\n\
             var __kiln_import_2__ = R(./util); var util = __kiln_import_2__;\n\
             var __kiln_import_3__ = R(./App.vue); var App = __kiln_require__.n(__kiln_import_3__); var a = __kiln_import_3__.a; var c = __kiln_import_3__.b;\n\
             R(./style.css);"
        );
    }

    #[test]
    fn lowers_export_forms() {
        let out = lower(
            "export const answer = 42\nexport function hello() {}\nconst x = 1\nexport { x as y }\nexport default { answer }\n",
            &Fixed,
        )
        .unwrap();
        assert_eq!(
            out,
            "exports.__esModule = true;\n\
             const answer = 42\n\
             function hello() {}\n\
             const x = 1\n\
             exports.y = x;\n\
             exports.default = { answer }\n\
             exports.answer = answer;\n\
             exports.hello = hello;"
        );
    }

    #[test]
    fn lowers_reexports_dynamic_and_require() {
        let out = lower(
            "export * from './a'\nexport { b } from './b'\nconst lazy = () => import('./lazy')\nconst m = require('./missing')\n",
            &Fixed,
        )
        .unwrap();
        assert!(out.contains("__kiln_require__.r(exports, R(./a));"));
        assert!(out.contains("var __kiln_reexport_1__ = R(./b); exports.b = __kiln_reexport_1__.b;"));
        assert!(out.contains("const lazy = () => L(./lazy)"));
        assert!(out.contains("const m = __kiln_require__.x(\"./missing\")"));
    }

    #[test]
    fn lowers_minified_modules() {
        let out = lower(
            r#"import a from"./a";import{b as c}from"./b";export default a+c;export{c as d};"#,
            &Fixed,
        )
        .unwrap();
        assert_eq!(
            out,
            "exports.__esModule = true;\n\
             var __kiln_import_1__ = R(./a); var a = __kiln_require__.n(__kiln_import_1__);\
             var __kiln_import_2__ = R(./b); var c = __kiln_import_2__.b;\
             exports.default = a+c;exports.d = c;"
        );
    }

    #[test]
    fn anonymous_default_declarations_are_terminated() {
        let out = lower("export default function(){}console.log(1)", &Fixed).unwrap();
        assert_eq!(
            out,
            "exports.__esModule = true;\nexports.default = function(){};console.log(1)"
        );
    }

    #[test]
    fn named_default_and_destructured_exports_are_assigned() {
        let out = lower(
            "export default class Store {}\nexport const { a, b: [c] } = src\n",
            &Fixed,
        )
        .unwrap();
        assert!(out.contains("class Store {}"));
        assert!(out.contains("const { a, b: [c] } = src"));
        assert!(out.ends_with("exports.default = Store;\nexports.a = a;\nexports.c = c;"));
    }

    #[test]
    fn comments_and_strings_are_left_alone() {
        let code = "// import x from './x'\nconst s = \"require('./y')\";";
        assert_eq!(lower(code, &Fixed).unwrap(), code);
    }
}

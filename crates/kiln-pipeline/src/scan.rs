//! Import discovery for scripts and style sheets.
//!
//! Scripts are parsed and walked, so specifiers inside comments and string
//! literals are never picked up. Style sheets are scanned textually.

use std::sync::LazyLock;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    CallExpression, ExportAllDeclaration, ExportNamedDeclaration, ImportDeclaration,
    ImportExpression,
};
use oxc_ast_visit::{walk, Visit};
use regex::Regex;

use crate::graph::ImportKind;
use crate::syntax::{self, SyntaxError};

pub(crate) static CSS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?[^;]*;"#).expect("static regex")
});

pub(crate) static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')]+?)["']?\s*\)"#).expect("static regex")
});

/// A specifier found in module source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub specifier: String,
    pub kind: ImportKind,
}

impl ImportRequest {
    pub fn new(specifier: impl Into<String>, kind: ImportKind) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
        }
    }
}

#[derive(Default)]
struct ImportCollector {
    found: Vec<ImportRequest>,
}

impl ImportCollector {
    fn push(&mut self, specifier: &str, kind: ImportKind) {
        self.found.push(ImportRequest::new(specifier, kind));
    }
}

impl<'a> Visit<'a> for ImportCollector {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        self.push(it.source.value.as_str(), ImportKind::Static);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &it.source {
            self.push(source.value.as_str(), ImportKind::Static);
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        self.push(it.source.value.as_str(), ImportKind::Static);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Some(specifier) = syntax::literal_source(&it.source) {
            self.push(&specifier, ImportKind::Dynamic);
        }
        walk::walk_import_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Some(specifier) = syntax::require_specifier(it) {
            self.push(&specifier, ImportKind::Static);
        }
        walk::walk_call_expression(self, it);
    }
}

/// Collect `import`, re-export, `require` and dynamic `import()` specifiers
/// in source order.
///
/// # Errors
///
/// `SyntaxError` when `code` is not valid JavaScript.
pub fn script_imports(code: &str) -> Result<Vec<ImportRequest>, SyntaxError> {
    let allocator = Allocator::default();
    let program = syntax::parse(&allocator, code)?;
    let mut collector = ImportCollector::default();
    walk::walk_program(&mut collector, &program);
    Ok(dedupe(collector.found.into_iter()))
}

/// Collect `@import` and `url()` references that point at local files.
pub fn style_imports(css: &str) -> Vec<ImportRequest> {
    let imports = CSS_IMPORT
        .captures_iter(css)
        .map(|caps| ImportRequest::new(&caps[1], ImportKind::Static));
    let urls = CSS_URL
        .captures_iter(css)
        .map(|caps| caps[1].trim().to_string())
        .filter(|url| is_local_reference(url))
        .map(|url| ImportRequest::new(url, ImportKind::Static));
    dedupe(imports.chain(urls))
}

/// References the build must resolve, as opposed to absolute URLs,
/// data URIs and fragment links left untouched.
pub fn is_local_reference(url: &str) -> bool {
    !(url.is_empty()
        || url.starts_with("data:")
        || url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("//")
        || url.starts_with('#')
        || url.starts_with('/'))
}

fn dedupe(requests: impl Iterator<Item = ImportRequest>) -> Vec<ImportRequest> {
    let mut out: Vec<ImportRequest> = Vec::new();
    for req in requests {
        if !out.contains(&req) {
            out.push(req);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(reqs: &[ImportRequest]) -> Vec<(&str, ImportKind)> {
        reqs.iter().map(|r| (r.specifier.as_str(), r.kind)).collect()
    }

    #[test]
    fn finds_all_script_import_forms() {
        let code = r#"
import Vue from 'vue'
import { a,
  b as c } from "./util"
import './side-effect.css'
export * from './reexport'
const lib = require('lib')
const Lazy = () => import('./Lazy.vue')
export const answer = 42
"#;
        assert_eq!(
            specs(&script_imports(code).unwrap()),
            vec![
                ("vue", ImportKind::Static),
                ("./util", ImportKind::Static),
                ("./side-effect.css", ImportKind::Static),
                ("./reexport", ImportKind::Static),
                ("lib", ImportKind::Static),
                ("./Lazy.vue", ImportKind::Dynamic),
            ]
        );
    }

    #[test]
    fn commented_and_quoted_specifiers_are_ignored() {
        let code = r#"
// const old = () => import('./old.js');
/* import legacy from './legacy' */
const hint = "require('./not-a-module')";
console.log('ok', hint);
"#;
        assert!(script_imports(code).unwrap().is_empty());
    }

    #[test]
    fn minified_imports_are_found() {
        let code = r#"import a from"./a";import{b as c}from"./b";export*from"./d";const e=()=>import("./e");"#;
        assert_eq!(
            specs(&script_imports(code).unwrap()),
            vec![
                ("./a", ImportKind::Static),
                ("./b", ImportKind::Static),
                ("./d", ImportKind::Static),
                ("./e", ImportKind::Dynamic),
            ]
        );
    }

    #[test]
    fn computed_specifiers_are_skipped() {
        let code = "const name = 'x';\nimport(`./pages/${name}.js`);\nrequire(name);\n";
        assert!(script_imports(code).unwrap().is_empty());
    }

    #[test]
    fn invalid_scripts_are_syntax_errors() {
        assert!(script_imports("import { from './a'").is_err());
    }

    #[test]
    fn style_imports_skip_remote_urls() {
        let css = r#"
@import "./base.css";
.a { background: url(./img/bg.png) }
.b { background: url("data:image/png;base64,AAAA") }
.c { background: url('https://cdn.example.com/x.png') }
.d { background: url(./img/bg.png) }
"#;
        assert_eq!(
            specs(&style_imports(css)),
            vec![
                ("./base.css", ImportKind::Static),
                ("./img/bg.png", ImportKind::Static),
            ]
        );
    }
}

//! Single-file components.
//!
//! A component file carries one `<template>`, an optional `<script>` and any
//! number of `<style>` blocks. The compiler turns the template into a string
//! property on the script's default export, rewriting asset references in
//! configured attributes into imports so they flow through the asset rules.

use std::path::Path;
use std::sync::LazyLock;

use kiln_config::{ChainStep, TemplateOptions, TransformId};
use regex::Regex;

use super::{file_label, json_string, normalize_css, options, SourceModule, TransformContext, Transformer};
use crate::error::TransformError;
use crate::graph::{ModuleKind, StyleSink};
use crate::scan::{self, CSS_IMPORT};

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<script(?:\s[^>]*)?>(.*?)</script>").expect("static regex")
});

static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<style(\s[^>]*)?>(.*?)</style>").expect("static regex")
});

static LANG_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"lang\s*=\s*["']?([\w-]+)"#).expect("static regex"));

static EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+default\s+").expect("static regex"));

const COMPONENT_VAR: &str = "__kiln_component__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBlock {
    /// `lang` attribute, `None` for plain CSS.
    pub lang: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledComponent {
    /// ES module source whose default export is the component.
    pub script: String,
    pub styles: Vec<StyleBlock>,
}

/// Compiles component sources. Swappable to plug in a full compiler.
pub trait TemplateCompiler: Send + Sync {
    fn compile(
        &self,
        source: &str,
        path: &Path,
        options: &TemplateOptions,
    ) -> Result<CompiledComponent, String>;
}

/// Built-in compiler: block extraction and asset URL rewriting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SfcCompiler;

impl SfcCompiler {
    fn template_block(source: &str) -> Option<&str> {
        let open = source.find("<template")?;
        let body_start = open + source[open..].find('>')? + 1;
        let close = source.rfind("</template>")?;
        (close >= body_start).then(|| source[body_start..close].trim())
    }

    /// Replace relative asset references with placeholders, returning the
    /// rewritten template and the specifiers in placeholder order.
    fn rewrite_asset_urls(template: &str, options: &TemplateOptions) -> (String, Vec<String>) {
        let mut rewritten = template.to_string();
        let mut specifiers = Vec::new();
        for (element, attrs) in &options.transform_asset_urls {
            for attr in attrs {
                let pattern = format!(
                    r#"(<{}\b[^>]*?\s{}\s*=\s*")([^"]+)(")"#,
                    regex::escape(element),
                    regex::escape(attr)
                );
                let Ok(re) = Regex::new(&pattern) else {
                    continue;
                };
                rewritten = re
                    .replace_all(&rewritten, |caps: &regex::Captures<'_>| {
                        let url = &caps[2];
                        if !is_module_request(url) {
                            return caps[0].to_string();
                        }
                        let slot = specifiers.len();
                        specifiers.push(url.strip_prefix('~').unwrap_or(url).to_string());
                        format!("{}\u{0}{slot}\u{0}{}", &caps[1], &caps[3])
                    })
                    .into_owned();
            }
        }
        (rewritten, specifiers)
    }

    /// String concatenation expression for the template.
    fn template_expression(template: &str) -> String {
        let mut parts = Vec::new();
        for (idx, piece) in template.split('\u{0}').enumerate() {
            if idx % 2 == 0 {
                parts.push(json_string(piece));
            } else {
                parts.push(format!("__kiln_asset_{piece}__"));
            }
        }
        parts.join(" + ")
    }
}

impl TemplateCompiler for SfcCompiler {
    fn compile(
        &self,
        source: &str,
        _path: &Path,
        options: &TemplateOptions,
    ) -> Result<CompiledComponent, String> {
        let template = Self::template_block(source).ok_or("component has no <template> block")?;
        let (template, specifiers) = Self::rewrite_asset_urls(template, options);

        let mut script = String::new();
        for (slot, specifier) in specifiers.iter().enumerate() {
            script.push_str(&format!(
                "import __kiln_asset_{slot}__ from {};\n",
                json_string(specifier)
            ));
        }

        match SCRIPT_BLOCK.captures(source) {
            Some(caps) => {
                let body = &caps[1];
                if !EXPORT_DEFAULT.is_match(body) {
                    return Err("<script> block has no default export".to_string());
                }
                let body = EXPORT_DEFAULT.replace(body, format!("\nvar {COMPONENT_VAR} = "));
                script.push_str(body.trim());
                script.push('\n');
            }
            None => script.push_str(&format!("var {COMPONENT_VAR} = {{}};\n")),
        }
        script.push_str(&format!(
            "{COMPONENT_VAR}.template = {};\nexport default {COMPONENT_VAR};\n",
            Self::template_expression(&template)
        ));

        let styles = STYLE_BLOCK
            .captures_iter(source)
            .map(|caps| StyleBlock {
                lang: caps
                    .get(1)
                    .and_then(|attrs| LANG_ATTR.captures(attrs.as_str()))
                    .map(|lang| lang[1].to_string()),
                content: caps[2].trim().to_string(),
            })
            .collect();

        Ok(CompiledComponent { script, styles })
    }
}

fn is_module_request(url: &str) -> bool {
    url.starts_with("./") || url.starts_with("../") || url.starts_with('~') || url.starts_with("@/")
}

/// Runs a [`TemplateCompiler`] over component files.
pub struct TemplateTransformer {
    compiler: Box<dyn TemplateCompiler>,
}

impl TemplateTransformer {
    pub fn new(compiler: impl TemplateCompiler + 'static) -> Self {
        Self {
            compiler: Box::new(compiler),
        }
    }
}

impl Transformer for TemplateTransformer {
    fn id(&self) -> TransformId {
        TransformId::Template
    }

    fn apply(
        &self,
        module: &mut SourceModule,
        step: &ChainStep<'_>,
        cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let opts: TemplateOptions = options(step)?;
        let compiled = self
            .compiler
            .compile(&module.code, &module.path, &opts)
            .map_err(|e| TransformError::new(step.transform, e))?;

        let label = file_label(&module.path);
        let mut sheets = Vec::new();
        for block in &compiled.styles {
            match block.lang.as_deref() {
                None | Some("css") => {
                    let css = normalize_css(&block.content, &label, false)
                        .map_err(|e| TransformError::new(step.transform, e))?;
                    module.imports.extend(scan::style_imports(&css));
                    sheets.push(CSS_IMPORT.replace_all(&css, "").trim().to_string());
                }
                Some(lang) => {
                    return Err(TransformError::new(
                        step.transform,
                        format!("<style lang=\"{lang}\"> needs a {lang} compiler, none is configured"),
                    ));
                }
            }
        }

        module.code = cx.defines.apply(&compiled.script);
        module.kind = ModuleKind::Script;
        if !sheets.is_empty() {
            module.style = Some(sheets.join("\n"));
            module.style_sink = if opts.extract_styles {
                StyleSink::Extract
            } else {
                StyleSink::Inject
            };
        }
        Ok(())
    }
}

use kiln_config::{ChainStep, TransformId};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use super::{file_label, SourceModule, TransformContext, Transformer};
use crate::error::TransformError;
use crate::graph::{ModuleKind, StyleSink};
use crate::scan::{self, CSS_IMPORT};

/// Parse and re-print `css`, optionally minified.
///
/// Minification merges duplicate rules and declarations, which is what the
/// dedupe stage relies on.
pub(crate) fn normalize_css(css: &str, filename: &str, minify: bool) -> Result<String, String> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;

    if minify {
        sheet
            .minify(MinifyOptions::default())
            .map_err(|e| e.to_string())?;
    }

    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

fn take_style(module: &mut SourceModule) -> String {
    module
        .style
        .take()
        .unwrap_or_else(|| std::mem::take(&mut module.code))
}

/// Validates and normalizes plain CSS.
pub struct PostcssTransformer;

impl Transformer for PostcssTransformer {
    fn id(&self) -> TransformId {
        TransformId::Postcss
    }

    fn apply(
        &self,
        module: &mut SourceModule,
        step: &ChainStep<'_>,
        _cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let css = take_style(module);
        let normalized = normalize_css(&css, &file_label(&module.path), false)
            .map_err(|e| TransformError::new(step.transform, e))?;
        module.style = Some(normalized);
        module.kind = ModuleKind::Style;
        Ok(())
    }
}

/// Turns `@import` and `url()` references into module dependencies.
///
/// `@import` rules are removed from the sheet; the imported module's styles
/// are ordered ahead of the importer when sheets are assembled.
pub struct CssTransformer;

impl Transformer for CssTransformer {
    fn id(&self) -> TransformId {
        TransformId::Css
    }

    fn apply(
        &self,
        module: &mut SourceModule,
        _step: &ChainStep<'_>,
        _cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let css = take_style(module);
        module.imports.extend(scan::style_imports(&css));
        module.style = Some(CSS_IMPORT.replace_all(&css, "").trim().to_string());
        module.code.clear();
        module.kind = ModuleKind::Style;
        Ok(())
    }
}

/// Final step of a style chain: choose where the sheet ends up.
pub struct StyleSinkTransformer {
    sink: StyleSink,
}

impl StyleSinkTransformer {
    pub fn inject() -> Self {
        Self {
            sink: StyleSink::Inject,
        }
    }

    pub fn extract() -> Self {
        Self {
            sink: StyleSink::Extract,
        }
    }
}

impl Transformer for StyleSinkTransformer {
    fn id(&self) -> TransformId {
        match self.sink {
            StyleSink::Inject => TransformId::StyleInject,
            StyleSink::Extract => TransformId::StyleExtract,
        }
    }

    fn apply(
        &self,
        module: &mut SourceModule,
        _step: &ChainStep<'_>,
        _cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        module.style_sink = self.sink;
        Ok(())
    }
}

/// Stand-in for a preprocessor whose compiler is not available.
///
/// Register a real transformer under the same id to compile these sources.
pub struct PreprocessorTransformer {
    id: TransformId,
}

impl PreprocessorTransformer {
    pub fn new(id: TransformId) -> Self {
        Self { id }
    }
}

impl Transformer for PreprocessorTransformer {
    fn id(&self) -> TransformId {
        self.id
    }

    fn apply(
        &self,
        _module: &mut SourceModule,
        step: &ChainStep<'_>,
        _cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        Err(TransformError::new(
            step.transform,
            format!("no {} compiler is configured", step.transform),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ImportKind;
    use crate::transform::tests::{descriptor, run};
    use kiln_config::BuildMode;

    #[test]
    fn css_collects_imports_and_sink() {
        let descriptor = descriptor(BuildMode::Production);
        let module = run(
            &descriptor,
            "/app/src/app.css",
            b"@import \"./base.css\";\n.a { background: url(./img/bg.png); }\n",
        )
        .unwrap();
        assert_eq!(module.kind, ModuleKind::Style);
        assert_eq!(module.style_sink, StyleSink::Extract);
        let specs: Vec<_> = module
            .imports
            .iter()
            .map(|r| (r.specifier.as_str(), r.kind))
            .collect();
        assert_eq!(
            specs,
            vec![
                ("./base.css", ImportKind::Static),
                ("./img/bg.png", ImportKind::Static)
            ]
        );
        let style = module.style.unwrap();
        assert!(!style.contains("@import"));
        assert!(style.contains(".a"));
    }

    #[test]
    fn development_styles_are_injected() {
        let descriptor = descriptor(BuildMode::Development);
        let module = run(&descriptor, "/app/src/app.css", b".a { color: red }").unwrap();
        assert_eq!(module.style_sink, StyleSink::Inject);
    }

    #[test]
    fn preprocessors_without_compiler_fail() {
        let descriptor = descriptor(BuildMode::Development);
        let err = run(&descriptor, "/app/src/app.scss", b"$c: red;").unwrap_err();
        assert_eq!(err.transform, TransformId::Scss);
    }

    #[test]
    fn minified_normalization_merges_duplicates() {
        let out = normalize_css(".a { color: red }\n.a { color: red }\n", "a.css", true).unwrap();
        assert_eq!(out.matches(".a").count(), 1);
    }
}

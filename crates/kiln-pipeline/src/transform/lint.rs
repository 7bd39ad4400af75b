use std::sync::LazyLock;

use kiln_config::{ChainStep, LintOptions, TransformId};
use regex::Regex;

use super::{options, SourceModule, TransformContext, Transformer};
use crate::error::{Diagnostic, DiagnosticKind, Severity, TransformError};

static DEBUGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*debugger\s*;?\s*$").expect("static regex"));

/// Source checks run ahead of the main chain.
///
/// Findings never fail the transform itself; they are attached to the module
/// as warnings or errors depending on `emit_warning`.
pub struct LintTransformer;

impl LintTransformer {
    fn check(source: &str) -> Vec<(usize, &'static str, &'static str)> {
        let mut findings = Vec::new();
        let mut blank_run = 0;
        for (idx, line) in source.lines().enumerate() {
            let line_no = idx + 1;
            if DEBUGGER.is_match(line) {
                findings.push((line_no, "no-debugger", "Unexpected 'debugger' statement"));
            }
            if line.ends_with(' ') || line.ends_with('\t') {
                findings.push((line_no, "no-trailing-spaces", "Trailing spaces not allowed"));
            }
            if line.trim().is_empty() {
                blank_run += 1;
                if blank_run == 2 {
                    findings.push((
                        line_no,
                        "no-multiple-empty-lines",
                        "More than 1 blank line not allowed",
                    ));
                }
            } else {
                blank_run = 0;
            }
        }
        findings
    }
}

impl Transformer for LintTransformer {
    fn id(&self) -> TransformId {
        TransformId::Lint
    }

    fn apply(
        &self,
        module: &mut SourceModule,
        step: &ChainStep<'_>,
        _cx: &TransformContext<'_>,
    ) -> Result<(), TransformError> {
        let opts: LintOptions = options(step)?;
        let severity = if opts.emit_warning {
            Severity::Warning
        } else {
            Severity::Error
        };
        for (line, rule, message) in Self::check(&module.code) {
            module.diagnostics.push(Diagnostic {
                severity,
                kind: DiagnosticKind::Lint {
                    rule: rule.to_string(),
                    line,
                },
                module: Some(module.path.clone()),
                message: message.to_string(),
            });
        }
        Ok(())
    }
}

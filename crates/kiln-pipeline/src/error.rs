//! Pipeline errors and build diagnostics.

use std::fmt;
use std::path::PathBuf;

use kiln_config::{StageKind, TransformId};
use serde::Serialize;
use thiserror::Error;

use crate::syntax::SyntaxError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The engine reported stats-level errors; the build produced no output.
    #[error("build failed with {} error(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),

    #[error("entry '{name}' not found: {}", .path.display())]
    EntryNotFound { name: String, path: PathBuf },

    /// An optimization stage failed; later stages did not run.
    #[error("optimization stage '{stage}' failed: {message}")]
    Stage { stage: StageKind, message: String },

    /// A module could not be parsed while rendering.
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Config(#[from] kiln_config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn stage(stage: StageKind, message: impl fmt::Display) -> Self {
        Error::Stage {
            stage,
            message: message.to_string(),
        }
    }
}

/// A transformer rejected a module.
#[derive(Debug, Clone, Error)]
#[error("{transform}: {message}")]
pub struct TransformError {
    pub transform: TransformId,
    pub message: String,
}

impl TransformError {
    pub fn new(transform: TransformId, message: impl fmt::Display) -> Self {
        Self {
            transform,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DiagnosticKind {
    Lint { rule: String, line: usize },
    Transform { transform: TransformId },
    Resolve { specifier: String },
    Syntax,
}

/// A warning or error attached to the build rather than aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub module: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn transform(module: PathBuf, err: TransformError) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::Transform {
                transform: err.transform,
            },
            module: Some(module),
            message: err.message,
        }
    }

    pub fn syntax(module: PathBuf, err: SyntaxError) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::Syntax,
            module: Some(module),
            message: format!("Syntax error: {err}"),
        }
    }

    pub fn unresolved(module: PathBuf, specifier: &str, reason: impl fmt::Display) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::Resolve {
                specifier: specifier.to_string(),
            },
            module: Some(module),
            message: format!("Module not found: '{specifier}' ({reason})"),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            write!(f, "{}", module.display())?;
            if let DiagnosticKind::Lint { line, .. } = &self.kind {
                write!(f, ":{line}")?;
            }
            f.write_str("\n  ")?;
        }
        f.write_str(&self.message)?;
        match &self.kind {
            DiagnosticKind::Lint { rule, .. } => write!(f, " ({rule})"),
            DiagnosticKind::Transform { transform } => write!(f, " [{transform}]"),
            DiagnosticKind::Resolve { .. } | DiagnosticKind::Syntax => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lint_diagnostic_display_includes_line_and_rule() {
        let diag = Diagnostic {
            severity: Severity::Warning,
            kind: DiagnosticKind::Lint {
                rule: "no-debugger".into(),
                line: 4,
            },
            module: Some(PathBuf::from("src/main.js")),
            message: "Unexpected 'debugger' statement".into(),
        };
        assert_eq!(
            diag.to_string(),
            "src/main.js:4\n  Unexpected 'debugger' statement (no-debugger)"
        );
        assert!(!diag.is_error());
    }

    #[test]
    fn transform_errors_become_error_diagnostics() {
        let diag = Diagnostic::transform(
            PathBuf::from("src/a.scss"),
            TransformError::new(TransformId::Scss, "no compiler"),
        );
        assert!(diag.is_error());
        assert!(diag.to_string().ends_with("no compiler [scss]"));
    }
}

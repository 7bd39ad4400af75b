//! Conversion of CLI errors into `miette` reports.

use miette::Report;

use crate::error::CliError;

/// Convert a `CliError` into the report printed when a command fails.
pub fn to_report(err: CliError) -> Report {
    match err {
        CliError::Pipeline(kiln_pipeline::Error::Diagnostics(diagnostics)) => {
            let body = diagnostics
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n\n");
            miette::miette!(
                help = "Fix the errors above and run the command again",
                "{} module error(s):\n\n{}",
                diagnostics.len(),
                body
            )
        }
        CliError::Pipeline(kiln_pipeline::Error::Stage { stage, message }) => miette::miette!(
            help = "This usually points at a malformed module or an invalid stage setting",
            "Optimization stage '{}' failed: {}",
            stage,
            message
        ),
        CliError::Config(e) => miette::miette!(
            help = "Check kiln.toml, the \"kiln\" field of package.json and KILN_* variables",
            "Configuration error: {}",
            e
        ),
        other => miette::miette!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_pipeline::{Diagnostic, DiagnosticKind, Severity};
    use std::path::PathBuf;

    #[test]
    fn diagnostics_are_listed() {
        let err = CliError::Pipeline(kiln_pipeline::Error::Diagnostics(vec![Diagnostic {
            severity: Severity::Error,
            kind: DiagnosticKind::Resolve {
                specifier: "./missing".into(),
            },
            module: Some(PathBuf::from("src/main.js")),
            message: "Module not found: './missing'".into(),
        }]));
        let report = format!("{:?}", to_report(err));
        assert!(report.contains("1 module error(s)"));
        assert!(report.contains("./missing"));
    }

    #[test]
    fn other_errors_keep_their_message() {
        let report = to_report(CliError::Server("boom".into()));
        assert_eq!(report.to_string(), "Server error: boom");
    }
}

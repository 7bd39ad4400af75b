//! `kiln build`: compose the production descriptor, run the engine and the
//! optimization pipeline, then replace the output root.

use std::path::Path;

use kiln_config::{describe, BuildMode, ConfigDiscovery, ProjectConfig};
use kiln_pipeline::{BuildArtifacts, NativeEngine};
use owo_colors::OwoColorize;

use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::{BuildError, Result};
use crate::ui;

const TIP: &str = "  Tip: built files are meant to be served over an HTTP server.\n  Opening index.html over file:// won't work.";

pub async fn execute(args: BuildArgs) -> Result<()> {
    let context = utils::project_root(args.cwd.as_deref())?;
    let spinner = ui::Spinner::new("Building for production...");

    match run(&args, &context).await {
        Ok(artifacts) => {
            spinner.finish(&format!(
                "Bundled {} modules into {} files",
                artifacts.module_count,
                artifacts.outputs.len()
            ));
            ui::print_build_summary(&artifacts);
            eprintln!("\n  {}\n", "Build complete.".cyan());
            eprintln!("{}\n", TIP.yellow());
            Ok(())
        }
        Err(err) => {
            spinner.fail("Build failed");
            eprintln!("  {}\n", "Build failed with errors.".red());
            Err(err)
        }
    }
}

/// Apply command-line flags on top of the loaded project configuration.
pub fn apply_args(project: &mut ProjectConfig, args: &BuildArgs) {
    if args.gzip {
        project.build.production_gzip = true;
    }
    if args.report {
        project.build.bundle_analyzer_report = true;
    }
}

/// Build and publish. The output root is only replaced once the whole build
/// has succeeded.
pub async fn run(args: &BuildArgs, context: &Path) -> Result<BuildArtifacts> {
    let mut project = ConfigDiscovery::new(context).load()?;
    apply_args(&mut project, args);
    let descriptor = describe(&project, context, BuildMode::Production)?;
    utils::validate_output_dir(&descriptor.output_root, context)?;
    tracing::debug!(output = %descriptor.output_root.display(), "production descriptor composed");

    let task_descriptor = descriptor.clone();
    let artifacts = tokio::task::spawn_blocking(move || {
        kiln_pipeline::build(&NativeEngine::new(), &task_descriptor)
    })
    .await
    .map_err(|e| BuildError::Interrupted(e.to_string()))??;

    artifacts
        .outputs
        .publish(&descriptor.output_root)
        .map_err(|source| BuildError::OutputNotWritable {
            path: descriptor.output_root.clone(),
            source,
        })?;
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn args() -> BuildArgs {
        BuildArgs {
            cwd: None,
            report: false,
            gzip: false,
        }
    }

    #[test]
    fn flags_enable_gzip_and_report() {
        let mut project = ProjectConfig::default();
        apply_args(
            &mut project,
            &BuildArgs {
                gzip: true,
                report: true,
                ..args()
            },
        );
        assert!(project.build.production_gzip);
        assert!(project.build.bundle_analyzer_report);
    }

    #[tokio::test]
    #[serial]
    async fn build_replaces_the_output_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.js"), "console.log('prod');\n").unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/stale.js"), "old").unwrap();

        let artifacts = run(&args(), dir.path()).await.unwrap();

        assert!(dir.path().join("dist/index.html").exists());
        assert!(!dir.path().join("dist/stale.js").exists());
        assert!(artifacts.outputs.len() >= 2);
    }

    #[tokio::test]
    #[serial]
    async fn failed_build_leaves_previous_output() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.js"), "import './missing.js';\n").unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/keep.js"), "old").unwrap();

        let err = run(&args(), dir.path()).await.unwrap_err();

        assert!(matches!(err, CliError::Pipeline(kiln_pipeline::Error::Diagnostics(_))));
        assert!(dir.path().join("dist/keep.js").exists());
    }
}

//! `kiln dev`: acquire a port, build once, serve, then rebuild on change
//! until Ctrl+C.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kiln_config::{describe, BuildDescriptor, BuildMode, ConfigDiscovery};
use tokio::signal;

use crate::cli::DevArgs;
use crate::commands::utils;
use crate::dev::watcher::{drain_burst, DEFAULT_IGNORES};
use crate::dev::{
    acquire_port, server, BuildOutcome, DevBuilder, DevEvent, DevServerState, FileWatcher,
    SharedState,
};
use crate::error::{BuildError, CliError, Result};
use crate::ui;

/// Quiet period that ends a burst of file changes.
const DEBOUNCE: Duration = Duration::from_millis(100);

pub async fn execute(args: DevArgs) -> Result<()> {
    let context = utils::project_root(args.cwd.as_deref())?;
    let descriptor = compose(&args, &context)?;
    let options = descriptor
        .dev_server_options()
        .cloned()
        .ok_or_else(|| CliError::Custom("development descriptor has no server options".into()))?;

    let (listener, allocation) =
        acquire_port(&options.host, options.port, options.port_scan_limit).await?;

    let builder = DevBuilder::new(descriptor);
    let state: SharedState = Arc::new(DevServerState::new(builder.document_url()));
    rebuild(&builder, &state).await?;

    let running = server::start(listener, allocation, state.clone(), &options);
    ui::ready(&running.url);
    if options.open_browser {
        open_browser(&running.url);
    }

    let ignores = DEFAULT_IGNORES.iter().map(|s| s.to_string()).collect();
    let (_watcher, mut changes) = FileWatcher::new(
        context,
        ignores,
        options.poll_interval_ms.map(Duration::from_millis),
    )?;

    let mut handle = running.handle;
    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                let coalesced = drain_burst(&mut changes, DEBOUNCE).await;
                tracing::debug!(path = %change.path().display(), coalesced, "sources changed");
                rebuild(&builder, &state).await?;
            }
            _ = signal::ctrl_c() => {
                tracing::debug!("shutting down dev server");
                break;
            }
            result = &mut handle => {
                return match result {
                    Ok(served) => served,
                    Err(e) => Err(CliError::Server(e.to_string())),
                };
            }
        }
    }
    Ok(())
}

/// Load the project and apply the command-line overrides.
pub fn compose(args: &DevArgs, context: &Path) -> Result<BuildDescriptor> {
    let mut project = ConfigDiscovery::new(context).load()?;
    if let Some(port) = args.port {
        project.dev.port = port;
    }
    if let Some(host) = &args.host {
        project.dev.host = host.clone();
    }
    if args.open {
        project.dev.auto_open_browser = true;
    }
    Ok(describe(&project, context, BuildMode::Development)?)
}

/// Run one build on a blocking thread and publish the result to clients.
/// A failed build keeps serving the previous output.
pub async fn rebuild(builder: &DevBuilder, state: &SharedState) -> Result<()> {
    state.start_build();
    state.broadcast(&DevEvent::BuildStarted).await;

    let task = builder.clone();
    let outcome = tokio::task::spawn_blocking(move || task.build())
        .await
        .map_err(|e| BuildError::Interrupted(e.to_string()))?;

    match outcome {
        BuildOutcome::Success { duration_ms, cache } => {
            tracing::debug!(duration_ms, files = cache.len(), "rebuild finished");
            state.complete_build(duration_ms, cache);
            state
                .broadcast(&DevEvent::BuildCompleted { duration_ms })
                .await;
        }
        BuildOutcome::Failed { errors, overlay } => {
            ui::error(&format!("Failed to compile with {} error(s)", errors.len()));
            for error in &errors {
                eprintln!("{error}\n");
            }
            state.fail_build(errors.clone(), overlay.clone());
            state
                .broadcast(&DevEvent::BuildFailed { errors, overlay })
                .await;
        }
    }
    Ok(())
}

fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    if let Err(e) = result {
        ui::warning(&format!("Failed to open browser: {e}"));
    }
}

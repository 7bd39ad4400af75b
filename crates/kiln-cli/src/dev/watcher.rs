//! Source watcher for development rebuilds.
//!
//! Native notifications by default; polling when `dev.poll` is set, for file
//! systems that do not deliver events (network mounts, some containers).

use crate::error::{CliError, Result};
use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Directories never watched, relative to the project root.
pub const DEFAULT_IGNORES: [&str; 3] = ["node_modules", "dist", "target"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

pub struct FileWatcher {
    _watcher: Box<dyn Watcher + Send>,
    root: PathBuf,
}

impl FileWatcher {
    /// Watch `root` recursively. Changes under any of `ignores` (and dot
    /// files) are dropped before they reach the channel.
    ///
    /// # Errors
    ///
    /// `FileNotFound` when `root` does not exist; `Watch` when the platform
    /// watcher cannot be created.
    pub fn new(
        root: PathBuf,
        ignores: Vec<String>,
        poll_interval: Option<Duration>,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(CliError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(256);
        let filter_root = root.clone();
        let handler = move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(%err, "file watcher error");
                    return;
                }
            };
            for path in &event.paths {
                if should_ignore(path, &filter_root, &ignores) {
                    continue;
                }
                let change = match event.kind {
                    EventKind::Create(_) => FileChange::Created(path.clone()),
                    EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };
                // A full queue already guarantees a rebuild.
                let _ = tx.try_send(change);
            }
        };

        let mut watcher: Box<dyn Watcher + Send> = match poll_interval {
            Some(interval) => Box::new(PollWatcher::new(
                handler,
                Config::default().with_poll_interval(interval),
            )?),
            None => Box::new(notify::recommended_watcher(handler)?),
        };
        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), polling = poll_interval.is_some(), "watching sources");

        Ok((Self { _watcher: watcher, root }, rx))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Outside the root, under an ignored directory, or hidden.
pub fn should_ignore(path: &Path, root: &Path, ignores: &[String]) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return true;
    };
    rel.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        (name.starts_with('.') && name != "." && name != "..")
            || ignores.iter().any(|ignored| ignored.as_str() == name)
    })
}

/// Wait out a burst of changes: keep draining until the channel has been
/// quiet for `quiet`, returning how many changes were coalesced.
pub async fn drain_burst(rx: &mut mpsc::Receiver<FileChange>, quiet: Duration) -> usize {
    let mut drained = 0;
    while let Ok(Some(_)) = tokio::time::timeout(quiet, rx.recv()).await {
        drained += 1;
    }
    drained
}

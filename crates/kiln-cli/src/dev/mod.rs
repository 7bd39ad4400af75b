//! Development server.
//!
//! - [`port`] resolves the listening port once, scanning upward when taken
//! - [`builder`] runs development builds into an in-memory [`BundleCache`]
//! - [`server`] serves the cache and pushes [`DevEvent`]s over SSE
//! - [`watcher`] reports source changes that should trigger a rebuild

pub mod builder;
pub mod error_overlay;
pub mod port;
pub mod server;
pub mod state;
pub mod watcher;

pub use builder::{BuildOutcome, DevBuilder};
pub use port::{acquire_port, PortAllocation};
pub use server::{start, RunningServer};
pub use state::{BuildStatus, BundleCache, DevServerState, SharedState};
pub use watcher::{FileChange, FileWatcher};

use serde::{Deserialize, Serialize};

/// Events pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DevEvent {
    BuildStarted,

    /// The cache now holds a fresh build; clients reload.
    BuildCompleted { duration_ms: u64 },

    /// The previous output keeps serving. `overlay` is rendered HTML, present
    /// only when the error overlay is enabled.
    BuildFailed {
        errors: Vec<String>,
        overlay: Option<String>,
    },
}

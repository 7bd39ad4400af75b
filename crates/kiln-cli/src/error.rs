//! Error handling for the kiln CLI.
//!
//! - [`CliError`] is what every command returns
//! - [`BuildError`] covers driver-level build failures
//! - configuration and pipeline errors convert in through `#[from]`
//!
//! [`report::to_report`] turns a `CliError` into the final `miette` report.
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_template(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("Set build.template in kiln.toml")
//! }
//! ```

pub mod report;

use std::path::PathBuf;

use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration discovery or composition failed
    #[error("Configuration error: {0}")]
    Config(#[from] kiln_config::ConfigError),

    /// The engine or an optimization stage failed
    #[error("{0}")]
    Pipeline(#[from] kiln_pipeline::Error),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Every port from the preferred one up to the scan limit is taken
    #[error("No free port on {host} between {first} and {last}\n\nHint: Set PORT to a free port or raise dev.port_scan_limit")]
    PortExhaustion { host: String, first: u16, last: u16 },

    /// Binding failed for a reason other than the port being taken
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Development server errors
    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

/// Build driver errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The output root would delete something that is not a build directory
    #[error("Refusing to use {} as the output root: {reason}\n\nHint: Point build.assets_root at a dedicated directory such as 'dist'", .path.display())]
    UnsafeOutputDir { path: PathBuf, reason: String },

    /// Publishing the output failed
    #[error("Failed to write output to {}: {source}\n\nHint: Check output directory permissions", .path.display())]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: kiln_pipeline::Error,
    },

    /// A dev-mode build task panicked or was cancelled
    #[error("Build task did not complete: {0}")]
    Interrupted(String),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Report a missing file as [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a hint to the error message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| CliError::Custom(format!("{}\n\nHint: {}", e.into(), hint)))
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| CliError::Custom(format!("{}: {}", msg, e.into())))
    }
}

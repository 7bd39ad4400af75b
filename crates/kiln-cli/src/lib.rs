//! Command-line driver for the kiln build orchestrator.
//!
//! - [`cli`] defines the `build`, `dev` and `inspect` commands
//! - [`commands`] implements them on top of `kiln-config` and `kiln-pipeline`
//! - [`dev`] is the development server: port fallback, live updates and the
//!   error overlay
//! - [`error`], [`logger`] and [`ui`] carry the ambient error reporting,
//!   logging and terminal output
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false, logger::DefaultLevel::Info);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{BuildError, CliError, Result, ResultExt};

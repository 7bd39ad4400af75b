//! Command-line interface definition.
//!
//! - `kiln build` produces the optimized production output
//! - `kiln dev` runs the development server with live updates
//! - `kiln inspect` prints the composed build descriptor

mod commands;
mod tests;

use clap::Parser;

pub use commands::{BuildArgs, Command, DevArgs, InspectArgs, ModeArg};

/// kiln - build and serve front-end applications
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Build and serve front-end applications",
    long_about = "kiln bundles script, style, component and asset modules into a\n\
                  deployable static site, and serves them in development with\n\
                  live updates and an in-browser error overlay."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

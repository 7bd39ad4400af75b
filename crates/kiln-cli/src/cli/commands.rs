use clap::{Args, Subcommand, ValueEnum};
use kiln_config::BuildMode;
use std::path::PathBuf;

/// Available kiln subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the application for production
    ///
    /// Minifies, splits and fingerprints the output and replaces the
    /// output root (build.assets_root, `dist` by default).
    Build(BuildArgs),

    /// Start the development server
    ///
    /// Serves an in-memory build, rebuilds on change and pushes live
    /// updates to connected browsers.
    Dev(DevArgs),

    /// Print the composed build configuration as JSON
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Also write stats.json and report.html
    #[arg(long)]
    pub report: bool,

    /// Also write .gz copies of compressible files
    #[arg(long)]
    pub gzip: bool,
}

#[derive(Args, Debug)]
pub struct DevArgs {
    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Preferred port; higher ports are tried when it is taken
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Open the browser once the server is ready
    #[arg(long)]
    pub open: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Mode to compose for; falls back to KILN_MODE, then NODE_ENV
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Development,
    Production,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Development => BuildMode::Development,
            ModeArg::Production => BuildMode::Production,
        }
    }
}

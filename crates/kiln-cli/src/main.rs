//! kiln command-line entry point.

use clap::Parser;
use kiln_cli::logger::DefaultLevel;
use kiln_cli::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let default_level = match args.command {
        cli::Command::Dev(_) => DefaultLevel::Warn,
        _ => DefaultLevel::Info,
    };
    logger::init_logger(args.verbose, args.quiet, args.no_color, default_level);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Build(build_args) => commands::build::execute(build_args).await,
        cli::Command::Dev(dev_args) => commands::dev::execute(dev_args).await,
        cli::Command::Inspect(inspect_args) => commands::inspect::execute(inspect_args).await,
    };

    result.map_err(error::report::to_report)
}

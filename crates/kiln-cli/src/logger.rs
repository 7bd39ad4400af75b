//! Logging setup for the kiln CLI.
//!
//! Filter precedence:
//! 1. `--verbose`: debug for the kiln crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. the command default: `info`, or `warn` for the dev server, whose
//!    console stays quiet apart from the ready line and build problems

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const KILN_CRATES: [&str; 4] = ["kiln", "kiln_cli", "kiln_config", "kiln_pipeline"];

/// Baseline level when neither flags nor `RUST_LOG` say otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultLevel {
    Info,
    Warn,
}

impl DefaultLevel {
    fn as_str(self) -> &'static str {
        match self {
            DefaultLevel::Info => "info",
            DefaultLevel::Warn => "warn",
        }
    }
}

fn directives(level: &str) -> String {
    KILN_CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build the filter for the given flags.
pub fn filter_for(verbose: bool, quiet: bool, default: DefaultLevel) -> EnvFilter {
    if verbose {
        EnvFilter::new(directives("debug"))
    } else if quiet {
        EnvFilter::new(directives("error"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(default.as_str())))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool, default: DefaultLevel) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter_for(verbose, quiet, default))
        .with(fmt_layer)
        .init();
}

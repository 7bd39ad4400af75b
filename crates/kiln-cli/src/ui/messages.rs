//! Status lines written to stderr.

use owo_colors::OwoColorize;

/// Print a success message.
///
/// ```no_run
/// kiln_cli::ui::success("Build complete.");
/// ```
pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Print a dimmed message, only when `RUST_LOG` is set.
pub fn debug(message: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        eprintln!("{} {}", "◆".dimmed(), message.dimmed());
    }
}

/// The line printed once the dev server is listening.
pub fn ready(url: &str) {
    eprintln!();
    eprintln!(
        "  {} Your application is running here: {}",
        "➜".green().bold(),
        url.cyan().underline()
    );
    eprintln!();
}

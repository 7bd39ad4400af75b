//! Terminal output: status lines, the build spinner and the summary table.
//!
//! Everything writes to stderr so stdout stays free for `kiln inspect`.

mod format;
mod messages;
mod spinner;

pub use format::{format_duration, format_size, print_build_summary, summary_rows};
pub use messages::{debug, error, info, ready, success, warning};
pub use spinner::Spinner;

/// Whether a CI provider's marker variable is set.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var(var).is_ok())
}

/// `NO_COLOR` wins over `FORCE_COLOR`; otherwise color follows the terminal.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }
    console::user_attended_stderr()
}

/// Apply the color decision to `console`, which styles the spinner.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && should_use_color();
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn ci_marker_is_detected() {
        std::env::set_var("CI", "true");
        assert!(is_ci());
        std::env::remove_var("CI");
    }

    #[test]
    #[serial]
    fn no_color_overrides_force_color() {
        std::env::set_var("NO_COLOR", "1");
        std::env::set_var("FORCE_COLOR", "1");
        assert!(!should_use_color());
        std::env::remove_var("NO_COLOR");
        assert!(should_use_color());
        std::env::remove_var("FORCE_COLOR");
    }

    #[test]
    fn init_colors_can_disable() {
        init_colors(true);
        assert!(!console::colors_enabled_stderr());
    }
}

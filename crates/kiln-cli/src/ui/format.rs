//! Size and duration formatting, and the post-build file table.

use console::Term;
use kiln_pipeline::{ArtifactKind, BuildArtifacts};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Human-readable byte count using 1024-based units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

fn kind_label(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Script => "script",
        ArtifactKind::Style => "style",
        ArtifactKind::Asset => "asset",
        ArtifactKind::Document => "html",
        ArtifactKind::Compressed => "gzip",
        ArtifactKind::Report => "report",
    }
}

/// Rows of the summary table: path, kind label and size, in output order.
pub fn summary_rows(artifacts: &BuildArtifacts) -> Vec<(String, &'static str, u64)> {
    artifacts
        .outputs
        .iter()
        .map(|file| (file.path.clone(), kind_label(file.kind), file.size() as u64))
        .collect()
}

/// Print the emitted files with their sizes to stderr.
pub fn print_build_summary(artifacts: &BuildArtifacts) {
    let width = (Term::stderr().size().1 as usize).min(80);
    let rows = summary_rows(artifacts);
    let name_width = rows.iter().map(|(path, _, _)| path.len()).max().unwrap_or(0);

    eprintln!("\n{}", "Build Summary".bold().underline());
    eprintln!("{}", "─".repeat(width));
    for (path, kind, size) in &rows {
        eprintln!(
            "  {} {:<name_width$}  {:>10}  {}",
            "▸".blue(),
            path.bright_white(),
            format_size(*size).dimmed(),
            kind.dimmed(),
        );
    }
    eprintln!("{}", "─".repeat(width));
    eprintln!(
        "  {} {} in {} files, {} modules, {}",
        "Total:".bold(),
        format_size(artifacts.outputs.total_size() as u64).green(),
        rows.len(),
        artifacts.module_count,
        format_duration(artifacts.duration).green()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1_048_576), "1.00 MB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn durations_pick_a_unit() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn summary_rows_follow_output_order() {
        let mut artifacts = BuildArtifacts::default();
        artifacts
            .outputs
            .insert("static/js/app.js", b"console.log(1)".to_vec(), ArtifactKind::Script);
        artifacts
            .outputs
            .insert("index.html", b"<html></html>".to_vec(), ArtifactKind::Document);

        let rows = summary_rows(&artifacts);
        assert_eq!(rows[0], ("static/js/app.js".to_string(), "script", 14));
        assert_eq!(rows[1].1, "html");
        print_build_summary(&artifacts);
    }
}

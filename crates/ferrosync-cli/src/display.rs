//! Display utilities for the ferrosync CLI

use console::{style, StyledObject};
use ferrosync_sync::SyncReport;
use ferrosync_types::{Direction, TransferStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Color a status symbol the way every status line shows it
fn paint(status: TransferStatus, text: &str) -> StyledObject<&str> {
    let styled = style(text);
    match status {
        TransferStatus::Uploaded => styled.green(),
        TransferStatus::Replaced => styled.yellow(),
        TransferStatus::Identical => styled.white(),
        TransferStatus::Obsolete => styled.magenta(),
        TransferStatus::Error => styled.red().bold(),
        TransferStatus::Info => styled.blue(),
        TransferStatus::Warn => styled.yellow().bold(),
    }
}

/// Render one status line: `<symbol> <message>`, plus the reply code for errors
pub fn status_line(
    status: TransferStatus,
    direction: Direction,
    message: &str,
    code: Option<u16>,
) -> String {
    let symbol = paint(status, status.symbol(direction));
    match code {
        Some(code) => format!("{} {} ({})", symbol, message, style(code).red()),
        None => format!("{} {}", symbol, message),
    }
}

/// Print the meaning of each status symbol
pub fn display_legend() {
    println!("{}", style("Legend:").bold().underlined());
    let rows = [
        (TransferStatus::Uploaded, "Uploaded (new file)"),
        (TransferStatus::Replaced, "Replaced (source was newer)"),
        (TransferStatus::Identical, "Identical (already in sync)"),
        (TransferStatus::Obsolete, "Obsolete (deleted from destination)"),
        (TransferStatus::Error, "Error"),
    ];
    for (status, meaning) in rows {
        println!(
            "  {} / {}  {}",
            paint(status, status.symbol(Direction::Upload)),
            paint(status, status.symbol(Direction::Download)),
            meaning
        );
    }
    println!(
        "  {}        {}",
        paint(TransferStatus::Warn, TransferStatus::Warn.symbol(Direction::Upload)),
        "Skipped (destination is newer)"
    );
}

/// Spinner shown while both trees are listed
pub fn create_spinner(quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(spinner_style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Print the counters of a finished run
pub fn display_report(report: &SyncReport) {
    println!();
    println!("{}", style("Sync Statistics:").bold().underlined());
    println!(
        "  Files scanned: {} source, {} destination",
        style(report.source_entries).cyan(),
        style(report.destination_entries).cyan()
    );
    println!("  Uploaded: {}", style(report.uploaded).green());
    println!("  Replaced: {}", style(report.replaced).yellow());
    println!("  Identical: {}", style(report.identical));
    println!("  Obsolete: {}", style(report.obsolete).magenta());
    if report.moved > 0 {
        println!("  Sources removed: {}", style(report.moved).cyan());
    }
    if report.conflicts > 0 {
        println!(
            "  Skipped (destination newer): {}",
            style(report.conflicts).yellow()
        );
    }
    println!(
        "  Errors: {}",
        if report.errors > 0 {
            style(report.errors).red()
        } else {
            style(report.errors).green()
        }
    );
    println!("  Workers: {}", style(report.workers).blue());
    println!(
        "  Duration: {}",
        style(format_duration(report.duration)).blue()
    );
}

/// Format a duration for humans
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

use super::*;
use std::cell::Cell;
use std::time::Duration;

pub(in crate::cli) fn stdout_is_tty() -> bool {
    io::stdout().is_terminal()
}

pub(in crate::cli) fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    if total == 0 || width == 0 {
        return "[]".to_string();
    }
    let filled = ((step as f32 / total as f32) * width as f32).round() as usize;
    let filled = filled.min(width);
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(empty))
}

/// Redraws one status line in place; ends it when the run reports `Done`.
pub(in crate::cli) fn render_sync_progress(last_len: &Cell<usize>, progress: &SyncProgress) {
    let total = progress.total;
    let processed = progress.processed.min(total);
    let bar = render_progress_bar(processed, total, 20);
    let repo = progress.repo_name.as_deref().unwrap_or("-");
    let stats = &progress.statistics;
    let line = format!(
        "{processed}/{total} {bar} {} {repo} ({}={} skipped={} failed={})",
        progress.action.as_str(),
        stats.label(),
        stats.succeeded,
        stats.skipped,
        stats.failed
    );
    let prev_len = last_len.get();
    if line.len() < prev_len {
        print!("\r{line}{}", " ".repeat(prev_len - line.len()));
    } else {
        print!("\r{line}");
    }
    let _ = io::stdout().flush();
    last_len.set(line.len());
    if matches!(progress.action, SyncAction::Done) {
        println!();
        last_len.set(0);
    }
}

pub(in crate::cli) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 60.0 {
        format!("{}m{:02}s", duration.as_secs() / 60, duration.as_secs() % 60)
    } else {
        format!("{secs:.1}s")
    }
}

pub(in crate::cli) fn print_report(report: &SyncReport) {
    let stats = &report.statistics;
    println!(
        "{}: {} selected, {} {}, {} skipped, {} failed in {}",
        report.intent,
        report.selected,
        stats.succeeded,
        stats.label(),
        stats.skipped,
        stats.failed,
        format_duration(stats.total_duration())
    );
    if let Some(average) = stats.average_duration() {
        println!("average per repository: {}", format_duration(average));
    }
    if report.cancelled {
        println!(
            "Cancelled after {} of {} repositories.",
            report.outcomes.len(),
            report.selected
        );
    }
    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("Failures:");
        for outcome in failures {
            println!("  {}: {}", outcome.name, outcome.message);
        }
    }
}

/// `YYYY-MM-DD HH:MM` in UTC.
pub(in crate::cli) fn epoch_to_label(epoch: u64) -> String {
    let Ok(ts) = time::OffsetDateTime::from_unix_timestamp(epoch as i64) else {
        return "unknown".to_string();
    };
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute()
    )
}

pub(in crate::cli) fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

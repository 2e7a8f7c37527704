//! Output formatting for suite runs and validation.
//!
//! All user-facing lines the CLI prints as trials complete, when a session
//! aborts, and when a record stream is validated.

use colored::*;
use framemark_runtime::{AbortRecord, SuiteOutcome, TrialRecord, ValidationReport};
use std::time::Duration;

/// Format a millisecond quantity in human-readable form.
pub fn format_ms(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0}μs", ms * 1_000.0)
    } else if ms < 1_000.0 {
        format!("{:.2}ms", ms)
    } else {
        format!("{:.2}s", ms / 1_000.0)
    }
}

/// Print a single trial result (called as each trial flushes).
pub fn print_trial_line(record: &TrialRecord) {
    let label = format!(
        "{} {}x trial {}/{}",
        record.common.mode.as_str(),
        record.common.instances,
        record.common.trial,
        record.common.trials
    );
    let mean_str = format_ms(record.summary.mean_ms);
    let p50_str = format_ms(record.summary.p50_ms);
    let p95_str = format_ms(record.summary.p95_ms);
    let p99_str = format_ms(record.summary.p99_ms);
    let fps_str = format!("{:.1} fps", record.extras.fps_effective);

    println!(
        "{} {} mean: {} ({}), p50: {}, p95: {}, p99: {} [{}/{}]",
        "TRIAL".green().bold(),
        label.cyan(),
        mean_str.cyan().bold(),
        fps_str.dimmed(),
        p50_str.dimmed(),
        p95_str.dimmed(),
        p99_str.dimmed(),
        record.common.condition_index,
        record.common.condition_count
    );

    if record.extras.missed_1_5x > 0 {
        println!(
            "        {} {} over 1.5x target ({:.1}%), {} over 2x, max {}",
            "Missed:".dimmed(),
            record.extras.missed_1_5x,
            record.extras.missed_1_5x_pct,
            record.extras.missed_2x,
            format_ms(record.extras.max_frame_ms)
        );
    }
}

/// Print an abort record.
pub fn print_abort_line(record: &AbortRecord) {
    println!(
        "{} {} {}",
        "ABORT".red().bold(),
        record.abort_code.as_str().red(),
        record.abort_reason.dimmed()
    );
    if record.partial_trial.frames_collected_primary > 0 {
        println!(
            "        {} {} frame(s) over {} before the cut",
            "Partial:".dimmed(),
            record.partial_trial.frames_collected_primary,
            format_ms(record.partial_trial.elapsed_ms)
        );
    }
}

/// Print summary footer after a suite run.
pub fn print_suite_summary(outcome: &SuiteOutcome, elapsed: Duration) {
    println!("{}", "─".repeat(80).dimmed());
    println!(
        "{} {} trial(s) completed, {} record(s) written in {:.1}s",
        "Summary:".cyan().bold(),
        outcome.trials_completed,
        outcome.records_flushed,
        elapsed.as_secs_f64()
    );
    if let Some(code) = outcome.aborted {
        println!(
            "{} suite aborted: {}",
            "Warning:".yellow().bold(),
            code.as_str().red()
        );
    }
}

/// Print a validation report, capping the finding list at `max_errors`.
pub fn print_validation_report(source: &str, report: &ValidationReport, max_errors: usize) {
    for finding in report.findings.iter().take(max_errors) {
        println!("{} {}", "INVALID".red().bold(), finding);
    }
    if report.findings.len() > max_errors {
        println!(
            "        {}",
            format!("... and {} more", report.findings.len() - max_errors).dimmed()
        );
    }

    println!("{}", "─".repeat(80).dimmed());
    if report.is_clean() {
        println!(
            "{} {}: {} record(s) checked, all valid",
            "OK".green().bold(),
            source,
            report.lines_checked
        );
    } else {
        println!(
            "{} {}: {} finding(s), {} of {} record(s) valid",
            "FAIL".red().bold(),
            source,
            report.findings.len(),
            report.records_valid,
            report.lines_checked
        );
    }
}

/// Aggregate footer when more than one stream was validated.
pub fn print_validation_totals(streams: usize, total_valid: usize, total_findings: usize) {
    if total_findings == 0 {
        println!(
            "{} {} streams, {} valid record(s), no findings",
            "Total:".cyan().bold(),
            streams,
            total_valid
        );
    } else {
        println!(
            "{} {} streams, {} valid record(s), {}",
            "Total:".cyan().bold(),
            streams,
            total_valid,
            format!("{} finding(s)", total_findings).red().bold()
        );
    }
}

//! Suite progress events and the built-in status-line observer.
//!
//! Drivers report state transitions through [`Observer`]; embedders can
//! attach their own implementation (the CLI layers a progress bar on top),
//! and [`StatusLine`] gives a colored stderr stream out of the box.

use colored::Colorize;

use crate::record::{AbortCode, SurfaceMode};

/// Everything the drivers report while a suite runs.
#[derive(Debug, Clone)]
pub enum SuiteEvent {
    SuiteStarted {
        suite_id: String,
        api: String,
        conditions: usize,
    },
    PhaseStarted {
        mode: SurfaceMode,
    },
    TrialStarted {
        condition_index: usize,
        condition_count: usize,
        instances: u32,
        trial: u32,
        trials: u32,
    },
    TrialFinished {
        condition_index: usize,
        condition_count: usize,
        instances: u32,
        trial: u32,
        mean_ms: f64,
        p50_ms: f64,
        p99_ms: f64,
        fps_effective: f64,
    },
    /// Immersive driver state transition ("awaiting-session", "measuring", ...).
    SessionState {
        state: &'static str,
    },
    /// First frame after session entry, with entry latency when known.
    SessionFirstFrame {
        entry_to_first_frame_ms: Option<f64>,
    },
    WatchdogArmed {
        timeout_ms: u64,
    },
    WatchdogExpired,
    SessionRefused {
        reason: String,
    },
    Aborted {
        code: AbortCode,
        reason: String,
    },
    Flushed {
        records: usize,
    },
    SuiteFinished {
        completed: usize,
        aborted: bool,
    },
}

/// Receives suite events as they happen.
pub trait Observer {
    fn event(&mut self, event: &SuiteEvent);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn event(&mut self, _event: &SuiteEvent) {}
}

/// True when status output is suppressed.
pub fn quiet() -> bool {
    std::env::var("FRAMEMARK_QUIET").is_ok()
}

/// Colored stderr status lines, one per event worth narrating.
#[derive(Debug, Default)]
pub struct StatusLine;

impl StatusLine {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for StatusLine {
    fn event(&mut self, event: &SuiteEvent) {
        if quiet() {
            return;
        }

        match event {
            SuiteEvent::SuiteStarted {
                suite_id,
                api,
                conditions,
            } => {
                eprintln!(
                    "{} suite {} on {} ({} conditions)",
                    "▶".cyan().bold(),
                    suite_id.bold(),
                    api,
                    conditions
                );
            }
            SuiteEvent::PhaseStarted { mode } => {
                eprintln!("{} {} phase", "▶".cyan(), mode.as_str());
            }
            SuiteEvent::TrialStarted {
                condition_index,
                condition_count,
                instances,
                trial,
                trials,
            } => {
                eprintln!(
                    "  {} condition {}/{}: {} instances, trial {}/{}",
                    "·".dimmed(),
                    condition_index,
                    condition_count,
                    instances,
                    trial,
                    trials
                );
            }
            SuiteEvent::TrialFinished {
                condition_index,
                condition_count,
                mean_ms,
                p50_ms,
                p99_ms,
                fps_effective,
                ..
            } => {
                eprintln!(
                    "  {} condition {}/{}: mean {:.2}ms  p50 {:.2}ms  p99 {:.2}ms  {:.1} fps",
                    "✓".green(),
                    condition_index,
                    condition_count,
                    mean_ms,
                    p50_ms,
                    p99_ms,
                    fps_effective
                );
            }
            SuiteEvent::SessionState { state } => {
                eprintln!("  {} session: {}", "·".dimmed(), state.dimmed());
            }
            SuiteEvent::SessionFirstFrame {
                entry_to_first_frame_ms,
            } => match entry_to_first_frame_ms {
                Some(ms) => eprintln!(
                    "  {} first frame {:.0}ms after entry request",
                    "·".dimmed(),
                    ms
                ),
                None => eprintln!("  {} first frame", "·".dimmed()),
            },
            SuiteEvent::WatchdogArmed { timeout_ms } => {
                eprintln!(
                    "  {} entry watchdog armed ({}ms)",
                    "·".dimmed(),
                    timeout_ms
                );
            }
            SuiteEvent::WatchdogExpired => {
                eprintln!("  {} entry watchdog expired", "✗".red().bold());
            }
            SuiteEvent::SessionRefused { reason } => {
                eprintln!("  {} session refused: {}", "✗".red(), reason);
            }
            SuiteEvent::Aborted { code, reason } => {
                eprintln!(
                    "{} aborted ({}): {}",
                    "✗".red().bold(),
                    code.as_str().red(),
                    reason
                );
            }
            SuiteEvent::Flushed { records } => {
                eprintln!("{} flushed {} records", "✓".green(), records);
            }
            SuiteEvent::SuiteFinished { completed, aborted } => {
                if *aborted {
                    eprintln!(
                        "{} suite ended early after {} completed trials",
                        "✗".red().bold(),
                        completed
                    );
                } else {
                    eprintln!(
                        "{} suite complete: {} trials",
                        "✓".green().bold(),
                        completed
                    );
                }
            }
        }
    }
}

/// Test observer that remembers everything it saw.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<SuiteEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_states(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SuiteEvent::SessionState { state } => Some(*state),
                _ => None,
            })
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn event(&mut self, event: &SuiteEvent) {
        self.events.push(event.clone());
    }
}

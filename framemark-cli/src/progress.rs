//! Progress bar display for suite execution.
//!
//! Layers an indicatif bar over the runtime's suite events when stderr is
//! a terminal. Non-tty and quiet runs skip the bar entirely; the caller
//! falls back to the runtime's status-line observer instead.

use framemark_runtime::{Observer, SuiteEvent};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::IsTerminal;

/// One bar tracking plan progress across the whole suite.
pub struct RunProgress {
    multi: MultiProgress,
    bar: Option<ProgressBar>,
    is_tty: bool,
    quiet: bool,
}

impl RunProgress {
    pub fn new(quiet: bool) -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            bar: None,
            is_tty,
            quiet,
        }
    }

    /// Check if progress display is enabled.
    pub fn is_enabled(&self) -> bool {
        self.is_tty && !self.quiet
    }

    fn start_bar(&mut self, conditions: usize) {
        let pb = self.multi.add(ProgressBar::new(conditions as u64));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:>12.cyan.bold} [{bar:30.green/dim}] {pos:>3}/{len:3} {msg}")
                .unwrap()
                .progress_chars("━━╺"),
        );
        pb.tick();
        self.bar = Some(pb);
    }

    /// Finish and clear the active bar.
    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Observer for RunProgress {
    fn event(&mut self, event: &SuiteEvent) {
        if !self.is_enabled() {
            return;
        }

        match event {
            SuiteEvent::SuiteStarted { conditions, .. } => {
                self.start_bar(*conditions);
            }
            // Combined runs replay the plan per phase; restart the bar.
            SuiteEvent::PhaseStarted { mode } => {
                if let Some(bar) = &self.bar {
                    bar.set_prefix(mode.as_str().to_string());
                    bar.set_position(0);
                    bar.set_message("starting");
                }
            }
            SuiteEvent::TrialStarted {
                instances,
                trial,
                trials,
                ..
            } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(format!(
                        "{} instances, trial {}/{}",
                        instances, trial, trials
                    ));
                }
            }
            SuiteEvent::TrialFinished {
                mean_ms,
                fps_effective,
                ..
            } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                    bar.set_message(format!("mean {:.2}ms, {:.1} fps", mean_ms, fps_effective));
                }
            }
            SuiteEvent::SessionState { state } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(format!("session: {}", state));
                }
            }
            SuiteEvent::Aborted { .. } | SuiteEvent::SuiteFinished { .. } => {
                self.finish();
            }
            _ => {}
        }
    }
}

impl Drop for RunProgress {
    fn drop(&mut self) {
        self.finish();
    }
}

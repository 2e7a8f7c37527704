//! Immersive measurement driver.
//!
//! Frame delivery belongs to the environment: the driver pulls events and
//! treats every returned frame as one callback registration, so the loop
//! body is the per-frame handler. States:
//!
//! AwaitingSession -> SessionStarting -> PreIdleBlank -> Measuring ->
//! InterTrialPause -> ... -> Flushing -> Ended, with Aborting reachable from
//! any in-session state.
//!
//! Two cadence series run side by side: environment display timestamps
//! (primary, authoritative) and the wall clock (secondary). The window
//! close check uses wall time and runs before sampling, exactly like the
//! windowed driver.

use crate::abort::{build_abort_record, EntryWatchdog, PartialProbe, RecordSink, WatchdogVerdict};
use crate::backend::{CameraRig, InstancePlacement, Renderer};
use crate::clock::Clock;
use crate::error::HarnessError;
use crate::plan::Condition;
use crate::progress::{Observer, SuiteEvent};
use crate::record::{AbortCode, SurfaceMode, TrialRecord};
use crate::session::{
    EntryPoll, ImmersiveFrame, ImmersiveSession, SessionEvent, SessionSource, SessionTelemetry,
    Viewport,
};
use crate::stats::{derive_extras, SampleSeries};
use crate::suite::SuiteContext;

/// What the immersive phase accomplished.
#[derive(Debug, Clone)]
pub struct ImmersiveOutcome {
    pub trials_completed: usize,
    pub abort: Option<AbortCode>,
    pub session_entered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SessionPhase {
    /// Blank-rendering until the pre-idle deadline.
    PreIdleBlank { until_ms: f64 },
    Measuring,
    /// Blank-rendering between trials.
    InterTrialPause { until_ms: f64 },
    /// Log flushed, session end requested, draining until Ended.
    Flushing,
}

#[derive(Debug, Clone, Copy)]
struct WindowMarks {
    open_wall_ms: f64,
    open_env_ms: f64,
}

/// Bookkeeping for the trial currently measuring.
struct ActiveTrial {
    condition: Condition,
    started_at_ms: f64,
    warm_until_ms: f64,
    window: Option<WindowMarks>,
    primary: SampleSeries,
    secondary: SampleSeries,
    last_env_ts_ms: Option<f64>,
    last_wall_ts_ms: Option<f64>,
    viewports: Vec<Viewport>,
    effective_pixels: u64,
}

impl ActiveTrial {
    fn new(condition: Condition, now_wall_ms: f64, warmup_ms: u64) -> Self {
        Self {
            condition,
            started_at_ms: now_wall_ms,
            warm_until_ms: now_wall_ms + warmup_ms as f64,
            window: None,
            primary: SampleSeries::new(),
            secondary: SampleSeries::new(),
            last_env_ts_ms: None,
            last_wall_ts_ms: None,
            viewports: Vec::new(),
            effective_pixels: 0,
        }
    }

    /// First post-warmup frame: record marks and viewport geometry, no
    /// sample yet.
    fn open_window(&mut self, now_wall_ms: f64, frame: &ImmersiveFrame) {
        self.window = Some(WindowMarks {
            open_wall_ms: now_wall_ms,
            open_env_ms: frame.display_time_ms,
        });
        self.viewports = frame.views.clone();
        self.effective_pixels = frame.effective_pixels();
        self.last_env_ts_ms = Some(frame.display_time_ms);
        self.last_wall_ts_ms = Some(now_wall_ms);
    }

    fn sample(&mut self, now_wall_ms: f64, frame: &ImmersiveFrame) {
        if let Some(prev) = self.last_env_ts_ms {
            self.primary.push(frame.display_time_ms - prev);
        }
        if let Some(prev) = self.last_wall_ts_ms {
            self.secondary.push(now_wall_ms - prev);
        }
        self.last_env_ts_ms = Some(frame.display_time_ms);
        self.last_wall_ts_ms = Some(now_wall_ms);
    }

    fn probe(&self, now_wall_ms: f64, observed_views: u32) -> PartialProbe {
        PartialProbe {
            elapsed_ms: (now_wall_ms - self.started_at_ms).max(0.0),
            primary_frames: self.primary.len() as u64,
            secondary_frames: self.secondary.len() as u64,
            observed_views,
        }
    }
}

/// Run the remaining plan on the immersive surface.
///
/// `arm_watchdog` is set for combined runs, where a finished windowed phase
/// must not wait forever for the operator to enter the headset.
pub fn run_immersive_phase(
    ctx: &mut SuiteContext,
    renderer: &mut dyn Renderer,
    source: &mut dyn SessionSource,
    sink: &mut dyn RecordSink,
    clock: &dyn Clock,
    observer: &mut dyn Observer,
    arm_watchdog: bool,
) -> Result<ImmersiveOutcome, HarnessError> {
    observer.event(&SuiteEvent::PhaseStarted {
        mode: SurfaceMode::Immersive,
    });

    if ctx.cursor.is_exhausted() {
        ctx.log.flush(sink)?;
        return Ok(ImmersiveOutcome {
            trials_completed: 0,
            abort: None,
            session_entered: false,
        });
    }

    let mut telemetry = SessionTelemetry::default();
    let mut watchdog = EntryWatchdog::new(
        ctx.config.immersive.entry_timeout_ms,
        ctx.config.immersive.entry_grace_ms,
    );
    if arm_watchdog && ctx.config.immersive.entry_timeout_ms > 0 {
        watchdog.arm(clock.now_ms());
        observer.event(&SuiteEvent::WatchdogArmed {
            timeout_ms: ctx.config.immersive.entry_timeout_ms,
        });
    }

    observer.event(&SuiteEvent::SessionState {
        state: "awaiting-session",
    });
    telemetry.mark_entry_requested(clock.now_ms());

    let poll_ms = ctx.config.immersive.poll_interval_ms.max(1) as f64;
    let mut session: Box<dyn ImmersiveSession> = loop {
        match source.poll_entry() {
            EntryPoll::Ready(session) => {
                watchdog.cancel();
                break session;
            }
            EntryPoll::Pending => {
                // In-flight request defers expiry by the grace interval.
                watchdog.check(clock.now_ms(), true);
                clock.sleep_ms(poll_ms);
            }
            EntryPoll::Idle => {
                if watchdog.check(clock.now_ms(), false) == WatchdogVerdict::Expired {
                    observer.event(&SuiteEvent::WatchdogExpired);
                    let reason = format!(
                        "no session entry within {}ms",
                        ctx.config.immersive.entry_timeout_ms
                    );
                    emit_abort(
                        ctx,
                        sink,
                        observer,
                        AbortCode::EntryTimeout,
                        &reason,
                        PartialProbe::default(),
                    )?;
                    return Ok(ImmersiveOutcome {
                        trials_completed: 0,
                        abort: Some(AbortCode::EntryTimeout),
                        session_entered: false,
                    });
                }
                clock.sleep_ms(poll_ms);
            }
            EntryPoll::Refused(reason) => {
                observer.event(&SuiteEvent::SessionRefused {
                    reason: reason.clone(),
                });
                if ctx.log.has_records() {
                    // Earlier records are worth preserving; degrade to an
                    // abort instead of erroring them away.
                    emit_abort(
                        ctx,
                        sink,
                        observer,
                        AbortCode::SessionAcquisitionFailed,
                        &reason,
                        PartialProbe::default(),
                    )?;
                    return Ok(ImmersiveOutcome {
                        trials_completed: 0,
                        abort: Some(AbortCode::SessionAcquisitionFailed),
                        session_entered: false,
                    });
                }
                if watchdog.is_armed() {
                    // Supervised wait continues; the operator may retry.
                    watchdog.arm(clock.now_ms());
                    telemetry.mark_entry_requested(clock.now_ms());
                    clock.sleep_ms(poll_ms);
                    continue;
                }
                return Err(HarnessError::SessionAcquisition(reason));
            }
        }
    };

    observer.event(&SuiteEvent::SessionState {
        state: "session-starting",
    });
    telemetry.reset_for_session_start(clock.now_ms());

    // Zero pre-idle degenerates into "begin on the first frame".
    let mut phase = SessionPhase::PreIdleBlank {
        until_ms: clock.now_ms() + ctx.config.timing.pre_idle_ms as f64,
    };
    if ctx.config.timing.pre_idle_ms > 0 {
        observer.event(&SuiteEvent::SessionState {
            state: "pre-idle-blank",
        });
    }

    let mut active: Option<ActiveTrial> = None;
    let mut trials_completed = 0usize;
    let mut last_view_count = 0u32;
    let duration_ms = ctx.config.timing.duration_ms as f64;
    let max_views = ctx.config.immersive.max_views;

    let abort = loop {
        match session.next_event() {
            SessionEvent::Ended => {
                if phase == SessionPhase::Flushing {
                    observer.event(&SuiteEvent::SessionState { state: "ended" });
                    break None;
                }
                // External end with plan remaining.
                let now_wall = clock.now_ms();
                let probe = active
                    .as_ref()
                    .map(|t| t.probe(now_wall, last_view_count))
                    .unwrap_or(PartialProbe {
                        observed_views: last_view_count,
                        ..Default::default()
                    });
                let reason = format!(
                    "session ended with {} of {} conditions remaining",
                    ctx.cursor.remaining(),
                    ctx.plan.len()
                );
                observer.event(&SuiteEvent::SessionState { state: "aborting" });
                emit_abort(
                    ctx,
                    sink,
                    observer,
                    AbortCode::SessionEndedEarly,
                    &reason,
                    probe,
                )?;
                break Some(AbortCode::SessionEndedEarly);
            }
            SessionEvent::Frame(frame) => {
                let now_wall = clock.now_ms();
                if telemetry.entry_to_first_frame_ms().is_none() {
                    telemetry.mark_first_frame(now_wall);
                    observer.event(&SuiteEvent::SessionFirstFrame {
                        entry_to_first_frame_ms: telemetry.entry_to_first_frame_ms(),
                    });
                }

                // Comparability guard runs on every frame, whatever the
                // phase.
                let view_count = frame.view_count() as u32;
                last_view_count = view_count;
                if view_count > max_views {
                    let probe = active
                        .as_ref()
                        .map(|t| t.probe(now_wall, view_count))
                        .unwrap_or(PartialProbe {
                            observed_views: view_count,
                            ..Default::default()
                        });
                    let reason = format!(
                        "view count exceeded: observed {}, max {}",
                        view_count, max_views
                    );
                    observer.event(&SuiteEvent::SessionState { state: "aborting" });
                    emit_abort(
                        ctx,
                        sink,
                        observer,
                        AbortCode::ViewCountExceeded,
                        &reason,
                        probe,
                    )?;
                    session.request_end();
                    drain(session.as_mut());
                    break Some(AbortCode::ViewCountExceeded);
                }

                match phase {
                    SessionPhase::PreIdleBlank { until_ms }
                    | SessionPhase::InterTrialPause { until_ms } => {
                        if now_wall >= until_ms {
                            if let Some(next) =
                                begin_trial(ctx, renderer, observer, now_wall)
                            {
                                active = Some(next);
                                phase = SessionPhase::Measuring;
                            } else {
                                renderer.blank_frame();
                            }
                        } else {
                            renderer.blank_frame();
                        }
                    }
                    SessionPhase::Measuring => {
                        let warm_until = active
                            .as_ref()
                            .map(|t| t.warm_until_ms)
                            .unwrap_or(now_wall);
                        let window_open = active
                            .as_ref()
                            .and_then(|t| t.window.map(|w| w.open_wall_ms));

                        if now_wall < warm_until {
                            renderer.draw_frame();
                        } else if window_open.is_none() {
                            if let Some(trial) = active.as_mut() {
                                trial.open_window(now_wall, &frame);
                            }
                            renderer.draw_frame();
                        } else if now_wall - window_open.unwrap_or(now_wall) >= duration_ms {
                            // Close check precedes sampling; this frame's
                            // timestamps become the end marks.
                            if let Some(trial) = active.take() {
                                let closed = trial.condition;
                                let record =
                                    finalize_trial(ctx, renderer, trial, &frame, now_wall);
                                observer.event(&SuiteEvent::TrialFinished {
                                    condition_index: ctx.cursor.index() + 1,
                                    condition_count: ctx.plan.len(),
                                    instances: closed.instance_count,
                                    trial: closed.trial,
                                    mean_ms: record.summary.mean_ms,
                                    p50_ms: record.summary.p50_ms,
                                    p99_ms: record.summary.p99_ms,
                                    fps_effective: record.extras.fps_effective,
                                });
                                ctx.log.append_trial(record);
                                trials_completed += 1;
                                ctx.cursor.advance();

                                if ctx.cursor.is_exhausted() {
                                    observer.event(&SuiteEvent::SessionState {
                                        state: "flushing",
                                    });
                                    let flushed = ctx.log.flush(sink)?;
                                    observer.event(&SuiteEvent::Flushed { records: flushed });
                                    session.request_end();
                                    phase = SessionPhase::Flushing;
                                } else {
                                    let delay_ms = ctx
                                        .plan
                                        .get(ctx.cursor.index())
                                        .map(|next| {
                                            if next.instance_count != closed.instance_count {
                                                ctx.config.timing.between_instances_ms
                                            } else {
                                                ctx.config.timing.cooldown_ms
                                            }
                                        })
                                        .unwrap_or(ctx.config.timing.cooldown_ms);
                                    observer.event(&SuiteEvent::SessionState {
                                        state: "inter-trial-pause",
                                    });
                                    phase = SessionPhase::InterTrialPause {
                                        until_ms: now_wall + delay_ms as f64,
                                    };
                                }
                            }
                            renderer.blank_frame();
                        } else {
                            if let Some(trial) = active.as_mut() {
                                trial.sample(now_wall, &frame);
                            }
                            renderer.draw_frame();
                        }
                    }
                    SessionPhase::Flushing => {
                        renderer.blank_frame();
                    }
                }
            }
        }
    };

    Ok(ImmersiveOutcome {
        trials_completed,
        abort,
        session_entered: true,
    })
}

/// Set up the next condition and present one blank frame so stale instance
/// geometry never reaches the display. Returns None when the plan is spent.
fn begin_trial(
    ctx: &mut SuiteContext,
    renderer: &mut dyn Renderer,
    observer: &mut dyn Observer,
    now_wall_ms: f64,
) -> Option<ActiveTrial> {
    let condition = ctx.plan.get(ctx.cursor.index())?;

    renderer.set_instances(&InstancePlacement {
        count: condition.instance_count,
        layout: ctx.config.scene.layout,
        spacing: ctx.config.scene.spacing,
    });
    renderer.set_camera(&CameraRig::default());
    renderer.blank_frame();

    observer.event(&SuiteEvent::SessionState { state: "measuring" });
    observer.event(&SuiteEvent::TrialStarted {
        condition_index: ctx.cursor.index() + 1,
        condition_count: ctx.plan.len(),
        instances: condition.instance_count,
        trial: condition.trial,
        trials: ctx.config.plan.trials,
    });

    Some(ActiveTrial::new(
        condition,
        now_wall_ms,
        ctx.config.timing.warmup_ms,
    ))
}

/// Summarize both cadence series and assemble the trial record. The primary
/// (environment-timestamp) series is authoritative; the wall-clock series
/// rides along as `xr_cadence_secondary`.
fn finalize_trial(
    ctx: &SuiteContext,
    renderer: &mut dyn Renderer,
    trial: ActiveTrial,
    closing_frame: &ImmersiveFrame,
    now_wall_ms: f64,
) -> TrialRecord {
    let marks = trial.window.unwrap_or(WindowMarks {
        open_wall_ms: now_wall_ms,
        open_env_ms: closing_frame.display_time_ms,
    });

    let summary = trial
        .primary
        .summarize(marks.open_env_ms, closing_frame.display_time_ms);
    let secondary = trial.secondary.summarize(marks.open_wall_ms, now_wall_ms);
    let extras = derive_extras(&summary, trial.primary.samples());

    let perf = if ctx.config.perf.collect {
        renderer.collect_perf(ctx.config.perf.detail)
    } else {
        None
    };

    let include_raw = ctx.config.perf.include_raw_samples;
    let raw_samples = include_raw.then(|| trial.primary.samples().to_vec());
    let raw_samples_secondary = include_raw.then(|| trial.secondary.samples().to_vec());

    TrialRecord {
        common: ctx.common_at_cursor(SurfaceMode::Immersive),
        summary,
        extras,
        perf,
        xr_viewports: Some(trial.viewports),
        xr_cadence_secondary: Some(secondary),
        xr_effective_pixels: Some(trial.effective_pixels),
        raw_samples,
        raw_samples_secondary,
    }
}

fn emit_abort(
    ctx: &mut SuiteContext,
    sink: &mut dyn RecordSink,
    observer: &mut dyn Observer,
    code: AbortCode,
    reason: &str,
    probe: PartialProbe,
) -> Result<(), HarnessError> {
    observer.event(&SuiteEvent::Aborted {
        code,
        reason: reason.to_string(),
    });
    let record = build_abort_record(
        ctx.common_at_cursor(SurfaceMode::Immersive),
        code,
        reason,
        ctx.config.immersive.max_views,
        probe,
    );
    if ctx.log.abort_and_flush(record, sink)? {
        observer.event(&SuiteEvent::Flushed {
            records: ctx.log.flushed_count(),
        });
    }
    Ok(())
}

/// Pull remaining events until the environment confirms the end.
fn drain(session: &mut dyn ImmersiveSession) {
    loop {
        if let SessionEvent::Ended = session.next_event() {
            break;
        }
    }
}

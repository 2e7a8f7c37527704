//! Windowed measurement driver.
//!
//! Each condition runs Idle -> PreIdle -> Warmup -> Measuring -> PostIdle in
//! a blocking loop paced by the renderer's own present. The first frame of a
//! window opens it and is never sampled; the close check runs at callback
//! entry, before sampling, so the closing timestamp becomes the end mark.

use crate::backend::{CameraRig, InstancePlacement, Renderer};
use crate::clock::Clock;
use crate::error::HarnessError;
use crate::progress::{Observer, SuiteEvent};
use crate::record::{SurfaceMode, TrialRecord};
use crate::stats::{derive_extras, SampleSeries};
use crate::suite::SuiteContext;

/// What the windowed phase accomplished.
#[derive(Debug, Clone, Copy)]
pub struct WindowedOutcome {
    pub trials_completed: usize,
}

/// Run every remaining planned condition on the windowed surface.
///
/// Records accumulate in the context log; flushing is the suite's concern.
pub fn run_windowed_phase(
    ctx: &mut SuiteContext,
    renderer: &mut dyn Renderer,
    clock: &dyn Clock,
    observer: &mut dyn Observer,
) -> Result<WindowedOutcome, HarnessError> {
    observer.event(&SuiteEvent::PhaseStarted {
        mode: SurfaceMode::Windowed,
    });

    let mut trials_completed = 0;
    let mut prev_instances: Option<u32> = None;

    while !ctx.cursor.is_exhausted() {
        let Some(condition) = ctx.plan.get(ctx.cursor.index()) else {
            break;
        };

        // Inter-trial spacing: a longer settle when the instance-count
        // block changes.
        if let Some(prev) = prev_instances {
            let delay_ms = if prev != condition.instance_count {
                ctx.config.timing.between_instances_ms
            } else {
                ctx.config.timing.cooldown_ms
            };
            clock.sleep_ms(delay_ms as f64);
        }

        observer.event(&SuiteEvent::TrialStarted {
            condition_index: ctx.cursor.index() + 1,
            condition_count: ctx.plan.len(),
            instances: condition.instance_count,
            trial: condition.trial,
            trials: ctx.config.plan.trials,
        });

        renderer.set_instances(&InstancePlacement {
            count: condition.instance_count,
            layout: ctx.config.scene.layout,
            spacing: ctx.config.scene.spacing,
        });
        renderer.set_camera(&CameraRig::default());

        if ctx.config.timing.pre_idle_ms > 0 {
            clock.sleep_ms(ctx.config.timing.pre_idle_ms as f64);
        }

        // Warmup: render at full tilt, discard timing.
        let warm_end_ms = clock.now_ms() + ctx.config.timing.warmup_ms as f64;
        while clock.now_ms() < warm_end_ms {
            renderer.draw_frame();
        }

        // Measuring window.
        let window_start_ms = clock.now_ms();
        let duration_ms = ctx.config.timing.duration_ms as f64;
        let mut series = SampleSeries::new();
        let mut last_frame_ms: Option<f64> = None;
        let window_end_ms;
        loop {
            let now_ms = clock.now_ms();
            if now_ms - window_start_ms >= duration_ms {
                window_end_ms = now_ms;
                break;
            }
            if let Some(prev_ms) = last_frame_ms {
                series.push(now_ms - prev_ms);
            }
            last_frame_ms = Some(now_ms);
            renderer.draw_frame();
        }

        let summary = series.summarize(window_start_ms, window_end_ms);
        let extras = derive_extras(&summary, series.samples());

        let perf = if ctx.config.perf.collect {
            renderer.collect_perf(ctx.config.perf.detail)
        } else {
            None
        };
        let raw_samples = ctx
            .config
            .perf
            .include_raw_samples
            .then(|| series.into_samples());

        observer.event(&SuiteEvent::TrialFinished {
            condition_index: ctx.cursor.index() + 1,
            condition_count: ctx.plan.len(),
            instances: condition.instance_count,
            trial: condition.trial,
            mean_ms: summary.mean_ms,
            p50_ms: summary.p50_ms,
            p99_ms: summary.p99_ms,
            fps_effective: extras.fps_effective,
        });

        let record = TrialRecord {
            common: ctx.common_at_cursor(SurfaceMode::Windowed),
            summary,
            extras,
            perf,
            xr_viewports: None,
            xr_cadence_secondary: None,
            xr_effective_pixels: None,
            raw_samples,
            raw_samples_secondary: None,
        };
        ctx.log.append_trial(record);

        if ctx.config.timing.post_idle_ms > 0 {
            renderer.blank_frame();
            clock.sleep_ms(ctx.config.timing.post_idle_ms as f64);
        }

        prev_instances = Some(condition.instance_count);
        ctx.cursor.advance();
        trials_completed += 1;
    }

    Ok(WindowedOutcome { trials_completed })
}

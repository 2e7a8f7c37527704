//! Suite orchestration: protocol guards, asset staging, phase dispatch, and
//! the terminal flush.

use crate::abort::{RecordLog, RecordSink};
use crate::backend::{AssetSource, Renderer};
use crate::clock::Clock;
use crate::config::{SuiteConfig, SurfaceSelection};
use crate::error::HarnessError;
use crate::immersive::run_immersive_phase;
use crate::plan::{build_plan, Condition, Plan, PlanCursor};
use crate::progress::{Observer, SuiteEvent};
use crate::protocol::{enforce_identity, enforce_order, KvStore};
use crate::record::{AbortCode, RecordCommon, SuiteMeta, SurfaceMode};
use crate::session::SessionSource;
use crate::windowed::run_windowed_phase;

/// Shared state the measurement drivers operate on.
pub struct SuiteContext {
    pub config: SuiteConfig,
    pub plan: Plan,
    pub cursor: PlanCursor,
    pub log: RecordLog,
    pub meta: SuiteMeta,
}

impl SuiteContext {
    pub fn new(config: SuiteConfig, meta: SuiteMeta) -> Result<Self, HarnessError> {
        config.validate()?;
        let plan = build_plan(
            &config.plan.instance_counts,
            config.plan.trials,
            config.plan.shuffle,
            config.plan.seed,
        )?;
        let cursor = PlanCursor::new(&plan);
        Ok(Self {
            config,
            plan,
            cursor,
            log: RecordLog::new(),
            meta,
        })
    }

    /// Start a fresh pass over the plan. Combined runs do this between the
    /// windowed and immersive phases; each phase keeps its own monotonic
    /// cursor.
    pub fn reset_cursor(&mut self) {
        self.cursor = PlanCursor::new(&self.plan);
    }

    /// Common envelope for the condition under the cursor. Past exhaustion
    /// the last condition stays addressable so a terminal abort record still
    /// carries a valid position.
    pub fn common_at_cursor(&self, mode: SurfaceMode) -> RecordCommon {
        let index = self.cursor.index().min(self.plan.len().saturating_sub(1));
        let condition = self.plan.get(index).unwrap_or(Condition {
            instance_count: 0,
            trial: 0,
        });
        self.meta.common(
            &self.config,
            mode,
            condition,
            index + 1,
            self.plan.len(),
            self.plan.effective_seed(),
        )
    }
}

/// Everything a suite borrows from its embedder.
pub struct SuiteDeps<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub assets: &'a mut dyn AssetSource,
    pub session_source: Option<&'a mut dyn SessionSource>,
    pub identity_store: Option<&'a mut dyn KvStore>,
    pub sink: &'a mut dyn RecordSink,
    pub clock: &'a dyn Clock,
    pub observer: &'a mut dyn Observer,
}

#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    pub trials_completed: usize,
    pub aborted: Option<AbortCode>,
    pub records_flushed: usize,
}

/// Run the configured suite end to end.
///
/// Guards fire before any frame is drawn; a violation produces an error and
/// zero records. After the phases the log flushes exactly once, wherever the
/// phases themselves did not already reach a terminal edge.
pub fn run_suite(
    ctx: &mut SuiteContext,
    deps: &mut SuiteDeps<'_>,
) -> Result<SuiteOutcome, HarnessError> {
    enforce_order(&ctx.config.protocol, deps.renderer.backend_name())?;

    if ctx.config.protocol.pin_identity {
        let store = deps.identity_store.as_deref_mut().ok_or_else(|| {
            HarnessError::invalid_configuration("identity pinning enabled with no identity store")
        })?;
        let fingerprint = deps.renderer.device_fingerprint();
        enforce_identity(store, &ctx.config.protocol.identity_group, &fingerprint)?;
    }

    if ctx.config.surface.includes_immersive() && deps.session_source.is_none() {
        return Err(HarnessError::invalid_configuration(
            "immersive surface selected with no session source",
        ));
    }

    // Stage the mesh once; every condition reuses it.
    let model_url = ctx.config.scene.model_url.clone();
    let asset = deps
        .assets
        .load(&model_url)
        .map_err(|source| HarnessError::Asset {
            url: model_url,
            source,
        })?;
    deps.renderer.set_mesh(&asset.buffers);
    ctx.meta.asset_timing = asset.timing;
    ctx.meta.asset_meta = asset.meta;

    deps.observer.event(&SuiteEvent::SuiteStarted {
        suite_id: ctx.meta.suite_id.clone(),
        api: ctx.meta.api.clone(),
        conditions: ctx.plan.len(),
    });

    let mut trials_completed = 0;
    let mut aborted = None;

    if ctx.config.surface.includes_windowed() {
        let outcome = run_windowed_phase(ctx, deps.renderer, deps.clock, deps.observer)?;
        trials_completed += outcome.trials_completed;
    }

    if ctx.config.surface.includes_immersive() {
        if ctx.config.surface == SurfaceSelection::Combined {
            ctx.reset_cursor();
        }
        if let Some(source) = deps.session_source.as_deref_mut() {
            let arm_watchdog = ctx.config.surface == SurfaceSelection::Combined;
            let outcome = run_immersive_phase(
                ctx,
                deps.renderer,
                source,
                deps.sink,
                deps.clock,
                deps.observer,
                arm_watchdog,
            )?;
            trials_completed += outcome.trials_completed;
            aborted = outcome.abort;
        }
    }

    // Terminal flush; a no-op when an immersive edge already flushed.
    let newly_flushed = ctx.log.flush(deps.sink)?;
    if newly_flushed > 0 {
        deps.observer.event(&SuiteEvent::Flushed {
            records: newly_flushed,
        });
    }

    deps.observer.event(&SuiteEvent::SuiteFinished {
        completed: trials_completed,
        aborted: aborted.is_some(),
    });

    Ok(SuiteOutcome {
        trials_completed,
        aborted,
        records_flushed: ctx.log.flushed_count(),
    })
}

//! NDJSON record schema: the common envelope, trial records, abort records.
//!
//! Field names are ABI: external dashboards key on the camelCase names
//! (`modelUrl`, `durationMs`, ...) and the dotted stats names
//! (`missed_1.5x`), so serde renames pin every one of them.

use serde::{Deserialize, Serialize};

use crate::backend::{AssetMeta, AssetTiming};
use crate::config::{Layout, SuiteConfig};
use crate::plan::Condition;
use crate::session::Viewport;
use crate::stats::{Extras, Summary};

/// Schema version stamped on every produced record.
pub const SCHEMA_VERSION: &str = "framemark-v2";

/// Schema versions the validator accepts.
pub const SUPPORTED_SCHEMA_VERSIONS: [&str; 2] = ["framemark-v1", "framemark-v2"];

/// Which surface produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceMode {
    Windowed,
    Immersive,
}

impl SurfaceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windowed => "windowed",
            Self::Immersive => "immersive",
        }
    }
}

/// Why a session was cut short. Closed set; the validator rejects strings
/// outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortCode {
    #[serde(rename = "session-ended-early")]
    SessionEndedEarly,
    #[serde(rename = "entry-timeout")]
    EntryTimeout,
    #[serde(rename = "view-count-exceeded")]
    ViewCountExceeded,
    #[serde(rename = "session-acquisition-failed")]
    SessionAcquisitionFailed,
}

impl AbortCode {
    pub const WIRE_NAMES: [&'static str; 4] = [
        "session-ended-early",
        "entry-timeout",
        "view-count-exceeded",
        "session-acquisition-failed",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionEndedEarly => "session-ended-early",
            Self::EntryTimeout => "entry-timeout",
            Self::ViewCountExceeded => "view-count-exceeded",
            Self::SessionAcquisitionFailed => "session-acquisition-failed",
        }
    }
}

/// Fields shared by every record of a suite, flattened into both record
/// kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCommon {
    pub schema_version: String,
    /// Backend API name, e.g. "gl" or "wgpu".
    pub api: String,
    pub mode: SurfaceMode,
    #[serde(rename = "modelUrl")]
    pub model_url: String,
    pub instances: u32,
    /// 1-based trial ordinal within its instance-count block.
    pub trial: u32,
    pub trials: u32,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "warmupMs")]
    pub warmup_ms: u64,
    #[serde(rename = "cooldownMs")]
    pub cooldown_ms: u64,
    #[serde(rename = "betweenInstancesMs")]
    pub between_instances_ms: u64,
    pub layout: Layout,
    pub spacing: f64,
    /// Effective shuffle seed (post zero-guard).
    pub seed: u32,
    pub shuffle: bool,
    #[serde(rename = "collectPerf")]
    pub collect_perf: bool,
    #[serde(rename = "perfDetail")]
    pub perf_detail: bool,
    #[serde(rename = "suiteId")]
    pub suite_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    /// 1-based position in the executed plan order.
    pub condition_index: usize,
    pub condition_count: usize,
    pub asset_timing: AssetTiming,
    pub asset_meta: AssetMeta,
    /// Host environment snapshot (os, machine id, harness version, ...).
    pub env: serde_json::Value,
}

/// One completed measurement trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub summary: Summary,
    pub extras: Extras,
    /// Renderer perf blob; serialized as explicit `null` when absent so
    /// consumers can rely on the key.
    pub perf: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xr_viewports: Option<Vec<Viewport>>,
    /// Wall-clock cadence summary for immersive trials; the environment
    /// timestamp series above stays authoritative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xr_cadence_secondary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xr_effective_pixels: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_samples: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_samples_secondary: Option<Vec<f64>>,
}

/// Progress salvaged from a trial that was cut short.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PartialTrial {
    pub elapsed_ms: f64,
    pub frames_collected_primary: u64,
    pub frames_collected_secondary: u64,
}

/// Terminal record for a session that could not finish its plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    /// Always true; distinguishes the record kind on the wire.
    pub aborted: bool,
    pub abort_code: AbortCode,
    pub abort_reason: String,
    pub observed_view_count: u32,
    pub expected_max_views: u32,
    pub partial_trial: PartialTrial,
}

/// Any emitted record line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Abort(AbortRecord),
    Trial(TrialRecord),
}

impl Record {
    pub fn is_abort(&self) -> bool {
        matches!(self, Record::Abort(_))
    }

    pub fn common(&self) -> &RecordCommon {
        match self {
            Record::Abort(r) => &r.common,
            Record::Trial(r) => &r.common,
        }
    }
}

/// Per-suite invariants stamped into every record's common envelope.
#[derive(Debug, Clone)]
pub struct SuiteMeta {
    pub api: String,
    pub model_url: String,
    pub suite_id: String,
    pub started_at: String,
    pub asset_timing: AssetTiming,
    pub asset_meta: AssetMeta,
    pub env: serde_json::Value,
}

impl SuiteMeta {
    /// Build a meta block stamped with the current wall time.
    pub fn stamped(api: impl Into<String>, model_url: impl Into<String>, suite_id: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            model_url: model_url.into(),
            suite_id: suite_id.into(),
            started_at: chrono::Utc::now().to_rfc3339(),
            asset_timing: AssetTiming::default(),
            asset_meta: AssetMeta::default(),
            env: serde_json::json!({}),
        }
    }

    /// Assemble the common envelope for one record.
    #[allow(clippy::too_many_arguments)]
    pub fn common(
        &self,
        config: &SuiteConfig,
        mode: SurfaceMode,
        condition: Condition,
        condition_index: usize,
        condition_count: usize,
        effective_seed: u32,
    ) -> RecordCommon {
        RecordCommon {
            schema_version: SCHEMA_VERSION.to_string(),
            api: self.api.clone(),
            mode,
            model_url: self.model_url.clone(),
            instances: condition.instance_count,
            trial: condition.trial,
            trials: config.plan.trials,
            duration_ms: config.timing.duration_ms,
            warmup_ms: config.timing.warmup_ms,
            cooldown_ms: config.timing.cooldown_ms,
            between_instances_ms: config.timing.between_instances_ms,
            layout: config.scene.layout,
            spacing: config.scene.spacing,
            seed: effective_seed,
            shuffle: config.plan.shuffle,
            collect_perf: config.perf.collect,
            perf_detail: config.perf.detail,
            suite_id: self.suite_id.clone(),
            started_at: self.started_at.clone(),
            condition_index,
            condition_count,
            asset_timing: self.asset_timing,
            asset_meta: self.asset_meta.clone(),
            env: self.env.clone(),
        }
    }
}

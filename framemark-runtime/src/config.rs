use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HarnessError;

/// Which measurement surface(s) a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceSelection {
    #[default]
    Windowed,
    Immersive,
    /// Windowed phase first, then the immersive phase on the same plan.
    Combined,
}

impl SurfaceSelection {
    pub fn includes_windowed(&self) -> bool {
        matches!(self, Self::Windowed | Self::Combined)
    }

    pub fn includes_immersive(&self) -> bool {
        matches!(self, Self::Immersive | Self::Combined)
    }
}

/// Instance placement pattern handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Grid,
    Ring,
    Line,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Ring => "ring",
            Self::Line => "line",
        }
    }
}

/// Backend ordering constraint for A/B comparison runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrderMode {
    #[default]
    #[serde(rename = "unconstrained")]
    Unconstrained,
    #[serde(rename = "fixed-ABBA")]
    FixedAbba,
    #[serde(rename = "fixed-BAAB")]
    FixedBaab,
    #[serde(rename = "externally-assigned")]
    ExternallyAssigned,
}

/// Condition-plan parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Instance counts to sweep, in block order.
    #[serde(default = "default_instance_counts")]
    pub instance_counts: Vec<u32>,

    /// Trials per instance count.
    #[serde(default = "default_trials")]
    pub trials: u32,

    /// Shuffle the cross product before running.
    #[serde(default)]
    pub shuffle: bool,

    /// Shuffle seed; 0 is replaced by a fixed golden constant.
    #[serde(default = "default_seed")]
    pub seed: u32,
}

fn default_instance_counts() -> Vec<u32> { vec![100, 1000] }
fn default_trials() -> u32 { 3 }
fn default_seed() -> u32 { 1 }

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            instance_counts: default_instance_counts(),
            trials: default_trials(),
            shuffle: false,
            seed: default_seed(),
        }
    }
}

/// Trial window and pacing delays, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Measured window length per trial.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,

    /// Rendered-but-unsampled lead-in per trial.
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    /// Delay between trials within one instance-count block.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Longer delay when the instance count changes between trials.
    #[serde(default = "default_between_instances_ms")]
    pub between_instances_ms: u64,

    /// Idle padding before the warmup of each trial.
    #[serde(default)]
    pub pre_idle_ms: u64,

    /// Idle padding (after one blanking render) following each trial.
    #[serde(default)]
    pub post_idle_ms: u64,
}

fn default_duration_ms() -> u64 { 10_000 }
fn default_warmup_ms() -> u64 { 2_000 }
fn default_cooldown_ms() -> u64 { 1_000 }
fn default_between_instances_ms() -> u64 { 4_000 }

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_duration_ms(),
            warmup_ms: default_warmup_ms(),
            cooldown_ms: default_cooldown_ms(),
            between_instances_ms: default_between_instances_ms(),
            pre_idle_ms: 0,
            post_idle_ms: 0,
        }
    }
}

/// Scene content parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Mesh asset location, resolved by the configured asset source.
    #[serde(default = "default_model_url")]
    pub model_url: String,

    #[serde(default)]
    pub layout: Layout,

    /// Spacing between instances in scene units.
    #[serde(default = "default_spacing")]
    pub spacing: f64,
}

fn default_model_url() -> String { "builtin://torus".to_string() }
fn default_spacing() -> f64 { 1.5 }

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            model_url: default_model_url(),
            layout: Layout::default(),
            spacing: default_spacing(),
        }
    }
}

/// Optional perf-counter collection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerfConfig {
    /// Ask the renderer for a perf blob after each trial.
    #[serde(default)]
    pub collect: bool,

    /// Request the renderer's detailed counter set.
    #[serde(default)]
    pub detail: bool,

    /// Embed raw per-frame sample arrays in trial records.
    #[serde(default)]
    pub include_raw_samples: bool,
}

/// Execution-order and device-identity guards for A/B comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub order_mode: OrderMode,

    /// 1-based position of this run within the fixed order sequence.
    #[serde(default = "default_order_index")]
    pub order_index: u32,

    #[serde(default = "default_backend_a")]
    pub backend_a: String,

    #[serde(default = "default_backend_b")]
    pub backend_b: String,

    /// Backend this run was assigned externally, for externally-assigned mode.
    #[serde(default)]
    pub assigned_backend: Option<String>,

    /// Pin the device fingerprint for the comparison group.
    #[serde(default)]
    pub pin_identity: bool,

    #[serde(default = "default_identity_group")]
    pub identity_group: String,
}

fn default_order_index() -> u32 { 1 }
fn default_backend_a() -> String { "gl".to_string() }
fn default_backend_b() -> String { "wgpu".to_string() }
fn default_identity_group() -> String { "default".to_string() }

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            order_mode: OrderMode::default(),
            order_index: default_order_index(),
            backend_a: default_backend_a(),
            backend_b: default_backend_b(),
            assigned_backend: None,
            pin_identity: false,
            identity_group: default_identity_group(),
        }
    }
}

/// Immersive-session limits and entry supervision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmersiveConfig {
    /// Maximum comparable view count; exceeding it aborts the session.
    #[serde(default = "default_max_views")]
    pub max_views: u32,

    /// Entry watchdog timeout for combined runs. 0 disables the watchdog.
    #[serde(default = "default_entry_timeout_ms")]
    pub entry_timeout_ms: u64,

    /// Extra allowance while an entry request is in flight.
    #[serde(default = "default_entry_grace_ms")]
    pub entry_grace_ms: u64,

    /// Session-entry poll cadence.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_views() -> u32 { 2 }
fn default_entry_timeout_ms() -> u64 { 30_000 }
fn default_entry_grace_ms() -> u64 { 10_000 }
fn default_poll_interval_ms() -> u64 { 150 }

impl Default for ImmersiveConfig {
    fn default() -> Self {
        Self {
            max_views: default_max_views(),
            entry_timeout_ms: default_entry_timeout_ms(),
            entry_grace_ms: default_entry_grace_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Where emitted records go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_records_file")]
    pub records_file: String,

    /// Write the NDJSON stream to stdout instead of a file.
    #[serde(default)]
    pub to_stdout: bool,
}

fn default_output_dir() -> PathBuf { PathBuf::from(".framemark") }
fn default_records_file() -> String { "records.ndjson".to_string() }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            records_file: default_records_file(),
            to_stdout: false,
        }
    }
}

/// Complete Framemark suite configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SuiteConfig {
    #[serde(default)]
    pub surface: SurfaceSelection,

    #[serde(default)]
    pub plan: PlanConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub scene: SceneConfig,

    #[serde(default)]
    pub perf: PerfConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub immersive: ImmersiveConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl SuiteConfig {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Ok(file_config) = Self::from_file("framemark.toml") {
            config = file_config;
        }

        config.apply_env_overrides();

        config
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            HarnessError::invalid_configuration(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: SuiteConfig = toml::from_str(&contents).map_err(|e| {
            HarnessError::invalid_configuration(format!(
                "failed to parse {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable values are ignored, matching file-over-default layering.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(counts) = std::env::var("FRAMEMARK_INSTANCES") {
            let parsed: Option<Vec<u32>> = counts
                .split(',')
                .map(|part| part.trim().parse().ok())
                .collect();
            if let Some(parsed) = parsed {
                if !parsed.is_empty() {
                    self.plan.instance_counts = parsed;
                }
            }
        }

        if let Ok(trials) = std::env::var("FRAMEMARK_TRIALS") {
            if let Ok(val) = trials.parse() {
                self.plan.trials = val;
            }
        }

        if let Ok(seed) = std::env::var("FRAMEMARK_SEED") {
            if let Ok(val) = seed.parse() {
                self.plan.seed = val;
            }
        }

        if std::env::var("FRAMEMARK_SHUFFLE").is_ok() {
            self.plan.shuffle = true;
        }

        if let Ok(duration) = std::env::var("FRAMEMARK_DURATION_MS") {
            if let Ok(val) = duration.parse() {
                self.timing.duration_ms = val;
            }
        }

        if let Ok(warmup) = std::env::var("FRAMEMARK_WARMUP_MS") {
            if let Ok(val) = warmup.parse() {
                self.timing.warmup_ms = val;
            }
        }

        if let Ok(url) = std::env::var("FRAMEMARK_MODEL_URL") {
            if !url.is_empty() {
                self.scene.model_url = url;
            }
        }

        if std::env::var("FRAMEMARK_COLLECT_PERF").is_ok() {
            self.perf.collect = true;
        }

        if let Ok(dir) = std::env::var("FRAMEMARK_OUTPUT_DIR") {
            if !dir.is_empty() {
                self.output.dir = PathBuf::from(dir);
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), HarnessError> {
        let path = path.as_ref();
        let toml = toml::to_string_pretty(self).map_err(|e| {
            HarnessError::invalid_configuration(format!("failed to serialize config: {}", e))
        })?;
        fs::write(path, toml).map_err(|e| {
            HarnessError::invalid_configuration(format!(
                "failed to write {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Reject configurations that cannot describe a runnable suite.
    ///
    /// Plan-shape errors (empty counts, zero trials) surface from
    /// [`crate::plan::build_plan`] instead.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.timing.duration_ms == 0 {
            return Err(HarnessError::invalid_configuration(
                "timing.duration_ms must be positive",
            ));
        }
        if self.scene.model_url.is_empty() {
            return Err(HarnessError::invalid_configuration(
                "scene.model_url must not be empty",
            ));
        }
        if !(self.scene.spacing > 0.0) {
            return Err(HarnessError::invalid_configuration(
                "scene.spacing must be positive",
            ));
        }
        if self.immersive.max_views == 0 {
            return Err(HarnessError::invalid_configuration(
                "immersive.max_views must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SuiteConfig::default();
        assert_eq!(config.surface, SurfaceSelection::Windowed);
        assert_eq!(config.plan.instance_counts, vec![100, 1000]);
        assert_eq!(config.plan.trials, 3);
        assert_eq!(config.plan.seed, 1);
        assert!(!config.plan.shuffle);
        assert_eq!(config.timing.duration_ms, 10_000);
        assert_eq!(config.timing.warmup_ms, 2_000);
        assert_eq!(config.timing.cooldown_ms, 1_000);
        assert_eq!(config.timing.between_instances_ms, 4_000);
        assert_eq!(config.scene.layout, Layout::Grid);
        assert_eq!(config.protocol.order_mode, OrderMode::Unconstrained);
        assert_eq!(config.immersive.max_views, 2);
        assert_eq!(config.immersive.entry_timeout_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = SuiteConfig::default();
        config.plan.trials = 5;
        config.protocol.order_mode = OrderMode::FixedAbba;
        let temp_file = NamedTempFile::new().unwrap();

        config.save(temp_file.path()).unwrap();
        let loaded = SuiteConfig::from_file(temp_file.path()).unwrap();

        assert_eq!(loaded.plan.trials, 5);
        assert_eq!(loaded.protocol.order_mode, OrderMode::FixedAbba);
        assert_eq!(loaded.timing.duration_ms, 10_000);
    }

    #[test]
    fn test_partial_config_file() {
        let toml_content = r#"
            surface = "combined"

            [timing]
            duration_ms = 5000

            [protocol]
            order_mode = "fixed-ABBA"
            order_index = 2

            [immersive]
            max_views = 4
        "#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = SuiteConfig::from_file(temp_file.path()).unwrap();

        // Specified values
        assert_eq!(config.surface, SurfaceSelection::Combined);
        assert_eq!(config.timing.duration_ms, 5000);
        assert_eq!(config.protocol.order_mode, OrderMode::FixedAbba);
        assert_eq!(config.protocol.order_index, 2);
        assert_eq!(config.immersive.max_views, 4);

        // Everything else falls back to defaults
        assert_eq!(config.plan.trials, 3);
        assert_eq!(config.timing.warmup_ms, 2_000);
        assert_eq!(config.scene.model_url, "builtin://torus");
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("FRAMEMARK_TRIALS", "7");
        env::set_var("FRAMEMARK_INSTANCES", "50, 250, 4000");
        env::set_var("FRAMEMARK_DURATION_MS", "2500");
        env::set_var("FRAMEMARK_SEED", "99");
        env::set_var("FRAMEMARK_SHUFFLE", "1");

        let mut config = SuiteConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.plan.trials, 7);
        assert_eq!(config.plan.instance_counts, vec![50, 250, 4000]);
        assert_eq!(config.timing.duration_ms, 2500);
        assert_eq!(config.plan.seed, 99);
        assert!(config.plan.shuffle);

        // A list with an unparseable entry leaves the setting untouched.
        env::set_var("FRAMEMARK_INSTANCES", "50, soup, 4000");
        let mut config = SuiteConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.plan.instance_counts, vec![100, 1000]);

        // Clean up
        env::remove_var("FRAMEMARK_TRIALS");
        env::remove_var("FRAMEMARK_INSTANCES");
        env::remove_var("FRAMEMARK_DURATION_MS");
        env::remove_var("FRAMEMARK_SEED");
        env::remove_var("FRAMEMARK_SHUFFLE");
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let mut config = SuiteConfig::default();
        config.timing.duration_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_views() {
        let mut config = SuiteConfig::default();
        config.immersive.max_views = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_order_mode_wire_names() {
        let toml = toml::to_string(&ProtocolConfig {
            order_mode: OrderMode::FixedBaab,
            ..Default::default()
        })
        .unwrap();
        assert!(toml.contains("fixed-BAAB"));

        let toml = toml::to_string(&ProtocolConfig {
            order_mode: OrderMode::ExternallyAssigned,
            ..Default::default()
        })
        .unwrap();
        assert!(toml.contains("externally-assigned"));
    }
}

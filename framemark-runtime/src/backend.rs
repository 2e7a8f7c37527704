//! Rendering collaborator seams.
//!
//! The harness owns timing and orchestration; everything GPU-facing sits
//! behind [`Renderer`] and [`AssetSource`]. Camera and placement math belong
//! to the renderer, which receives declarative state and draws on demand.

use serde::{Deserialize, Serialize};

use crate::config::Layout;

/// Raw mesh data handed to the renderer once per suite.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    /// Interleaved vertex attributes.
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

/// Asset acquisition timing, recorded on every trial record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetTiming {
    pub fetch_ms: f64,
    pub parse_ms: f64,
    pub total_ms: f64,
}

/// Mesh shape metadata, recorded on every trial record.
///
/// `extra` keeps source-specific keys (compression, attribute sets) flowing
/// through without a schema change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub vertex_count: u64,
    pub index_count: u64,
    pub triangle_count: u64,
    pub has_indices: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A loaded mesh plus its acquisition bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct MeshAsset {
    pub buffers: MeshBuffers,
    pub timing: AssetTiming,
    pub meta: AssetMeta,
}

/// Resolves a model URL into mesh buffers.
pub trait AssetSource {
    fn load(&mut self, model_url: &str) -> std::io::Result<MeshAsset>;
}

/// Declarative instance placement for one condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstancePlacement {
    pub count: u32,
    pub layout: Layout,
    pub spacing: f64,
}

/// Viewer framing handed to the renderer once per trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub eye: [f64; 3],
    pub look_at: [f64; 3],
    pub fov_y_deg: f64,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            eye: [0.0, 1.6, 4.0],
            look_at: [0.0, 1.0, 0.0],
            fov_y_deg: 60.0,
        }
    }
}

/// Names the backend for records and order checks.
pub trait BackendIdentity {
    /// Short API name, e.g. "gl" or "wgpu". Written to the `api` field.
    fn backend_name(&self) -> &str;

    /// Stable device fingerprint for identity pinning.
    fn device_fingerprint(&self) -> String;
}

/// Render surface driven by the measurement loops.
///
/// Calls are infallible: a present either happens or the frame is dropped by
/// the surface, and neither is an error the harness can act on.
pub trait Renderer: BackendIdentity {
    fn set_mesh(&mut self, mesh: &MeshBuffers);

    fn set_instances(&mut self, placement: &InstancePlacement);

    fn set_camera(&mut self, camera: &CameraRig);

    /// Render and present one frame of the current scene.
    fn draw_frame(&mut self);

    /// Present one cleared frame with no scene content.
    fn blank_frame(&mut self);

    /// Optional perf-counter blob collected after a trial.
    fn collect_perf(&mut self, detail: bool) -> Option<serde_json::Value> {
        let _ = detail;
        None
    }
}

//! Built-in synthetic backend.
//!
//! A renderer, asset source, and immersive session that simulate GPU work
//! with a deterministic cost model, so the harness runs end to end on any
//! machine. Real backends implement the same traits out of tree.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use framemark_runtime::{
    mix32, AssetMeta, AssetSource, AssetTiming, BackendIdentity, CameraRig, EntryPoll,
    ImmersiveFrame, ImmersiveSession, InstancePlacement, MeshAsset, MeshBuffers, Renderer,
    SessionEvent, SessionSource, Viewport,
};

use crate::env_meta;

/// Simulated renderer: each frame costs a fixed overhead plus a per-instance
/// cost, with bounded deterministic jitter from the shuffle mixer.
pub struct SyntheticRenderer {
    backend: String,
    base_frame_ms: f64,
    per_instance_us: f64,
    jitter_ms: f64,
    instances: u32,
    triangle_count: u64,
    rng: u32,
    frames_drawn: u64,
    blank_frames: u64,
}

impl SyntheticRenderer {
    pub fn new() -> Self {
        Self::named("synthetic")
    }

    /// Same simulation, different reported backend name. Lets a run stand in
    /// for either side of an A/B order protocol.
    pub fn named(backend: impl Into<String>) -> Self {
        Self::with_cost_model(backend, 2.0, 1.5, 0.6)
    }

    pub fn with_cost_model(
        backend: impl Into<String>,
        base_frame_ms: f64,
        per_instance_us: f64,
        jitter_ms: f64,
    ) -> Self {
        Self {
            backend: backend.into(),
            base_frame_ms,
            per_instance_us,
            jitter_ms,
            instances: 0,
            triangle_count: 0,
            rng: 0xA5A5_5A5A,
            frames_drawn: 0,
            blank_frames: 0,
        }
    }

    fn next_cost_ms(&mut self) -> f64 {
        self.rng = mix32(self.rng);
        let unit = (self.rng % 10_000) as f64 / 10_000.0;
        let jitter = (unit - 0.5) * 2.0 * self.jitter_ms;
        let load = self.instances as f64 * self.per_instance_us / 1000.0;
        (self.base_frame_ms + load + jitter).max(0.1)
    }
}

impl Default for SyntheticRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendIdentity for SyntheticRenderer {
    fn backend_name(&self) -> &str {
        &self.backend
    }

    fn device_fingerprint(&self) -> String {
        format!("{}:{}", self.backend, env_meta::machine_id())
    }
}

impl Renderer for SyntheticRenderer {
    fn set_mesh(&mut self, mesh: &MeshBuffers) {
        self.triangle_count = (mesh.indices.len() / 3) as u64;
    }

    fn set_instances(&mut self, placement: &InstancePlacement) {
        self.instances = placement.count;
    }

    fn set_camera(&mut self, _camera: &CameraRig) {}

    fn draw_frame(&mut self) {
        let cost = self.next_cost_ms();
        thread::sleep(Duration::from_secs_f64(cost / 1000.0));
        self.frames_drawn += 1;
    }

    fn blank_frame(&mut self) {
        thread::sleep(Duration::from_secs_f64(self.base_frame_ms / 1000.0));
        self.blank_frames += 1;
    }

    fn collect_perf(&mut self, detail: bool) -> Option<serde_json::Value> {
        let mut perf = serde_json::json!({
            "backend": self.backend,
            "frames_drawn": self.frames_drawn,
            "blank_frames": self.blank_frames,
            "instances": self.instances,
            "triangles_per_frame": self.instances as u64 * self.triangle_count,
        });
        if detail {
            perf["cost_model"] = serde_json::json!({
                "base_frame_ms": self.base_frame_ms,
                "per_instance_us": self.per_instance_us,
                "jitter_ms": self.jitter_ms,
            });
        }
        Some(perf)
    }
}

/// Resolves `builtin://` model URLs into procedural meshes.
pub struct SyntheticAssets;

impl AssetSource for SyntheticAssets {
    fn load(&mut self, model_url: &str) -> io::Result<MeshAsset> {
        let started = Instant::now();
        let buffers = match model_url {
            "builtin://torus" => torus_mesh(24, 24, 1.0, 0.35),
            "builtin://cube" => cube_mesh(),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("only builtin:// models are bundled, got '{}'", other),
                ))
            }
        };
        let parse_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut extra = serde_json::Map::new();
        extra.insert("source".to_string(), "procedural".into());

        Ok(MeshAsset {
            meta: AssetMeta {
                vertex_count: (buffers.vertices.len() / 6) as u64,
                index_count: buffers.indices.len() as u64,
                triangle_count: (buffers.indices.len() / 3) as u64,
                has_indices: true,
                extra,
            },
            timing: AssetTiming {
                fetch_ms: 0.0,
                parse_ms,
                total_ms: parse_ms,
            },
            buffers,
        })
    }
}

/// Torus with interleaved position+normal vertices.
fn torus_mesh(segments: u32, sides: u32, ring_radius: f32, tube_radius: f32) -> MeshBuffers {
    use std::f32::consts::TAU;

    let mut vertices = Vec::with_capacity((segments * sides * 6) as usize);
    let mut indices = Vec::with_capacity((segments * sides * 6) as usize);

    for s in 0..segments {
        let theta = s as f32 / segments as f32 * TAU;
        for t in 0..sides {
            let phi = t as f32 / sides as f32 * TAU;
            let (sin_t, cos_t) = theta.sin_cos();
            let (sin_p, cos_p) = phi.sin_cos();

            let cx = ring_radius + tube_radius * cos_p;
            vertices.extend_from_slice(&[
                cx * cos_t,
                tube_radius * sin_p,
                cx * sin_t,
                cos_p * cos_t,
                sin_p,
                cos_p * sin_t,
            ]);

            let a = s * sides + t;
            let b = (s + 1) % segments * sides + t;
            let c = s * sides + (t + 1) % sides;
            let d = (s + 1) % segments * sides + (t + 1) % sides;
            indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }

    MeshBuffers { vertices, indices }
}

/// Unit cube with per-face normals.
fn cube_mesh() -> MeshBuffers {
    // normal, then the two in-face axes.
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
    ];
    const CORNERS: [(f32, f32); 4] = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];

    let mut vertices = Vec::with_capacity(24 * 6);
    let mut indices = Vec::with_capacity(36);

    for (face, (normal, u, v)) in FACES.iter().enumerate() {
        for (cu, cv) in CORNERS {
            for axis in 0..3 {
                vertices.push(normal[axis] * 0.5 + u[axis] * cu + v[axis] * cv);
            }
            vertices.extend_from_slice(normal);
        }
        let base = face as u32 * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshBuffers { vertices, indices }
}

/// Stereo session delivering frames on a fixed refresh cadence.
pub struct SyntheticSession {
    period: Duration,
    display_time_ms: f64,
    views: Vec<Viewport>,
    end_requested: bool,
}

impl SyntheticSession {
    pub fn new(refresh_hz: f64) -> Self {
        Self::with_views(refresh_hz, 2)
    }

    pub fn with_views(refresh_hz: f64, view_count: u32) -> Self {
        let hz = if refresh_hz > 0.0 { refresh_hz } else { 90.0 };
        Self {
            period: Duration::from_secs_f64(1.0 / hz),
            display_time_ms: 0.0,
            views: vec![
                Viewport {
                    width: 1832,
                    height: 1920,
                };
                view_count as usize
            ],
            end_requested: false,
        }
    }
}

impl ImmersiveSession for SyntheticSession {
    fn next_event(&mut self) -> SessionEvent {
        if self.end_requested {
            return SessionEvent::Ended;
        }
        thread::sleep(self.period);
        self.display_time_ms += self.period.as_secs_f64() * 1000.0;
        SessionEvent::Frame(ImmersiveFrame {
            display_time_ms: self.display_time_ms,
            views: self.views.clone(),
        })
    }

    fn request_end(&mut self) {
        self.end_requested = true;
    }
}

/// Grants a synthetic session on the first poll.
pub struct SyntheticSessionSource {
    pub refresh_hz: f64,
    /// Views per delivered frame; raising this past the configured maximum
    /// trips the comparability guard.
    pub views: u32,
}

impl SyntheticSessionSource {
    pub fn new() -> Self {
        Self {
            refresh_hz: 90.0,
            views: 2,
        }
    }
}

impl Default for SyntheticSessionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSource for SyntheticSessionSource {
    fn poll_entry(&mut self) -> EntryPoll {
        EntryPoll::Ready(Box::new(SyntheticSession::with_views(
            self.refresh_hz,
            self.views,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemark_runtime::Layout;

    #[test]
    fn test_torus_mesh_counts() {
        let mesh = torus_mesh(24, 24, 1.0, 0.35);
        assert_eq!(mesh.vertices.len(), 576 * 6);
        assert_eq!(mesh.indices.len(), 3456);
        // Every index addresses a real vertex.
        assert!(mesh.indices.iter().all(|&i| (i as usize) < 576));
    }

    #[test]
    fn test_cube_mesh_counts() {
        let mesh = cube_mesh();
        assert_eq!(mesh.vertices.len(), 24 * 6);
        assert_eq!(mesh.indices.len(), 36);
    }

    #[test]
    fn test_asset_source_fills_meta() {
        let asset = SyntheticAssets.load("builtin://torus").unwrap();
        assert_eq!(asset.meta.vertex_count, 576);
        assert_eq!(asset.meta.triangle_count, 1152);
        assert!(asset.meta.has_indices);
        assert_eq!(asset.meta.extra["source"], "procedural");
        assert!(asset.timing.total_ms >= asset.timing.parse_ms);
    }

    #[test]
    fn test_asset_source_rejects_unknown_urls() {
        let err = SyntheticAssets.load("https://example.com/mesh.glb").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_cost_model_is_deterministic_and_loaded() {
        let placement = InstancePlacement {
            count: 1000,
            layout: Layout::Grid,
            spacing: 1.5,
        };

        let mut a = SyntheticRenderer::with_cost_model("synthetic", 2.0, 1.5, 0.6);
        let mut b = SyntheticRenderer::with_cost_model("synthetic", 2.0, 1.5, 0.6);
        a.set_instances(&placement);
        b.set_instances(&placement);

        let costs_a: Vec<f64> = (0..16).map(|_| a.next_cost_ms()).collect();
        let costs_b: Vec<f64> = (0..16).map(|_| b.next_cost_ms()).collect();
        assert_eq!(costs_a, costs_b);

        // 2.0 base + 1.5ms load, jitter bounded by 0.6.
        for cost in costs_a {
            assert!(cost >= 2.9 && cost <= 4.1, "cost out of band: {}", cost);
        }
    }

    #[test]
    fn test_perf_blob_shape() {
        let mut renderer = SyntheticRenderer::new();
        renderer.set_mesh(&cube_mesh());

        let brief = renderer.collect_perf(false).unwrap();
        assert_eq!(brief["backend"], "synthetic");
        assert!(brief.get("cost_model").is_none());

        let detailed = renderer.collect_perf(true).unwrap();
        assert_eq!(detailed["cost_model"]["base_frame_ms"], 2.0);
    }

    #[test]
    fn test_session_delivers_stereo_frames_then_ends() {
        let mut session = SyntheticSession::new(1000.0);

        let SessionEvent::Frame(first) = session.next_event() else {
            panic!("expected a frame");
        };
        let SessionEvent::Frame(second) = session.next_event() else {
            panic!("expected a frame");
        };
        assert_eq!(first.view_count(), 2);
        assert!(second.display_time_ms > first.display_time_ms);

        session.request_end();
        assert_eq!(session.next_event(), SessionEvent::Ended);
    }

    #[test]
    fn test_forced_view_count_reaches_frames() {
        let mut source = SyntheticSessionSource::new();
        source.views = 3;

        let EntryPoll::Ready(mut session) = source.poll_entry() else {
            panic!("expected an immediate session");
        };
        let SessionEvent::Frame(frame) = session.next_event() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.view_count(), 3);
    }

    #[test]
    fn test_renamed_backend_flows_through_identity() {
        let renderer = SyntheticRenderer::named("gl");
        assert_eq!(renderer.backend_name(), "gl");
        assert!(renderer.device_fingerprint().starts_with("gl:"));
    }
}

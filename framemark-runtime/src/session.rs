//! Immersive-session collaborator seams.
//!
//! The environment owns session lifetime and frame pacing; the driver pulls
//! frames one at a time. Each [`ImmersiveSession::next_event`] call stands in
//! for one frame-callback registration, so returning from the handler re-arms
//! the loop for the next frame exactly like a compositor callback chain.

use serde::{Deserialize, Serialize};

/// One composited view's pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// One delivered immersive frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ImmersiveFrame {
    /// Environment-supplied display timestamp, the primary cadence series.
    pub display_time_ms: f64,
    /// Per-view surfaces for this frame; length is the view count.
    pub views: Vec<Viewport>,
}

impl ImmersiveFrame {
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn effective_pixels(&self) -> u64 {
        self.views.iter().map(Viewport::pixels).sum()
    }
}

/// What the environment delivered on this pull.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Frame(ImmersiveFrame),
    /// The session is gone: externally ended, or ended after our own
    /// end request.
    Ended,
}

/// A granted immersive session.
pub trait ImmersiveSession {
    /// Block until the next frame (or session end) and return it.
    fn next_event(&mut self) -> SessionEvent;

    /// Ask the environment to wind the session down. Frames may still be
    /// delivered until [`SessionEvent::Ended`] arrives.
    fn request_end(&mut self);
}

/// Result of polling for session entry.
pub enum EntryPoll {
    /// Nothing happening; keep polling.
    Idle,
    /// An entry request is in flight (user prompt, compositor handshake).
    Pending,
    /// Session granted.
    Ready(Box<dyn ImmersiveSession>),
    /// The environment declined the session.
    Refused(String),
}

/// Grants immersive sessions on request.
pub trait SessionSource {
    fn poll_entry(&mut self) -> EntryPoll;
}

/// Per-session timing: how long entry took from request to first frame.
///
/// Reset on every session start so repeated entries never inherit stale
/// marks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionTelemetry {
    entry_requested_at_ms: Option<f64>,
    first_frame_at_ms: Option<f64>,
}

impl SessionTelemetry {
    pub fn mark_entry_requested(&mut self, now_ms: f64) {
        self.entry_requested_at_ms = Some(now_ms);
        self.first_frame_at_ms = None;
    }

    pub fn reset_for_session_start(&mut self, now_ms: f64) {
        if self.entry_requested_at_ms.is_none() {
            self.entry_requested_at_ms = Some(now_ms);
        }
        self.first_frame_at_ms = None;
    }

    pub fn mark_first_frame(&mut self, now_ms: f64) {
        if self.first_frame_at_ms.is_none() {
            self.first_frame_at_ms = Some(now_ms);
        }
    }

    pub fn entry_to_first_frame_ms(&self) -> Option<f64> {
        match (self.entry_requested_at_ms, self.first_frame_at_ms) {
            (Some(requested), Some(first)) => Some((first - requested).max(0.0)),
            _ => None,
        }
    }
}

//! Framemark runtime: a frame-timing benchmark harness for instanced mesh
//! scenes, measuring windowed surfaces and immersive sessions under one
//! condition plan and emitting NDJSON records.

pub mod abort;
pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod immersive;
pub mod plan;
pub mod progress;
pub mod protocol;
pub mod record;
pub mod session;
pub mod stats;
pub mod suite;
pub mod validate;
pub mod windowed;

pub use abort::*;
pub use backend::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use immersive::*;
pub use plan::*;
pub use progress::*;
pub use protocol::*;
pub use record::*;
pub use session::*;
pub use stats::*;
pub use suite::*;
pub use validate::*;
pub use windowed::*;

//! # recorder-core
//!
//! Platform-agnostic live recording engine.
//!
//! Captures one or two audio sources (hardware microphone and/or the
//! system-output loopback), applies per-stream digital gain, routes
//! blocks through bounded queues, optionally mixes the two sources, and
//! streams PCM into either a WAV container or an external encoder
//! process — with pause/resume and clean shutdown, without ever blocking
//! the capture callbacks.
//!
//! Platform audio backends (e.g. the cpal backend in `recorder-cpal`)
//! implement the `CaptureBackend` trait and plug into the generic
//! `RecordingSession`.
//!
//! ## Architecture
//!
//! ```text
//! recorder-core (this crate)
//! ├── traits/       ← CaptureBackend, CaptureStream, BlockCallback
//! ├── models/       ← RecordError, SessionState, RecordingConfig, DeviceHandle, PcmBlock, ...
//! ├── select        ← microphone / loopback endpoint resolution heuristics
//! ├── processing/   ← gain stage, mixer, RIFF header layout
//! ├── block_queue   ← bounded SPSC transport, wait-free on the capture side
//! ├── sink/         ← WAV container writer, piped encoder writer, metadata sidecar
//! └── session       ← RecordingSession (the orchestrator)
//! ```

pub mod block_queue;
pub mod models;
pub mod processing;
pub mod select;
pub mod session;
pub mod sink;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::block::PcmBlock;
pub use models::config::{OutputFormat, RecordingConfig, RecordingMode, MAX_GAIN_LEVEL};
pub use models::device::{DeviceHandle, DeviceRole};
pub use models::error::RecordError;
pub use models::outcome::{
    RecordedTrack, RecordingMetadata, RecordingOutcome, SessionStats, TrackKind,
};
pub use models::state::SessionState;
pub use session::RecordingSession;
pub use sink::SinkWriter;
pub use traits::capture::{BlockCallback, CaptureBackend, CaptureStream};

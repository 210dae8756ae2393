//! # recorder-cpal
//!
//! Cross-platform capture backend for recorder-core, built on cpal.
//!
//! Provides:
//! - `CpalBackend` — endpoint enumeration (inputs, loopback/monitor
//!   endpoints, default output) over the host's default audio host
//! - `CpalCaptureStream` — callback-driven input capture with
//!   fixed-frame block delivery
//!
//! ## Loopback capture
//! Hosts differ in how system audio is reached:
//! - PulseAudio/PipeWire mirror each output as a "Monitor of …" input
//!   endpoint, which is opened like any other input.
//! - WASAPI captures a render endpoint directly; the backend opens an
//!   input stream on the output device itself.
//!
//! ## Usage
//! ```ignore
//! use recorder_cpal::CpalBackend;
//! use recorder_core::{RecordingConfig, RecordingSession};
//!
//! let mut session = RecordingSession::new(CpalBackend::new());
//! session.start(RecordingConfig::default())?;
//! ```

pub mod backend;
pub mod stream;

pub use backend::CpalBackend;
pub use stream::CpalCaptureStream;

use thiserror::Error;

/// Errors that can occur while setting up or driving a recording.
///
/// Only the synchronous `start()` path raises to the caller. Worker
/// threads record failures into session counters instead of propagating
/// across the thread boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to open capture stream: {0}")]
    StreamOpen(String),

    #[error("failed to open sink: {0}")]
    SinkOpen(String),

    #[error("failed to launch encoder: {0}")]
    EncoderLaunch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot {op} while session is {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

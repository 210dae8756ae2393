/// Role an endpoint plays in capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    /// A capture endpoint (microphone or other input).
    Input,
    /// An endpoint that captures the mix played on an output device.
    LoopbackOutput,
}

/// One resolved host audio endpoint.
///
/// Immutable once resolved; valid for the lifetime of the session that
/// resolved it and not shared across sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Position in the host's enumeration order. Opaque to the engine.
    pub index: usize,
    /// Display name as reported by the host.
    pub name: String,
    /// Native sample rate in Hz. Captured audio is not resampled.
    pub sample_rate: u32,
    /// Maximum channel count the endpoint supports.
    pub max_channels: u16,
    pub role: DeviceRole,
}

impl DeviceHandle {
    /// Channel count used when opening this endpoint: stereo at most,
    /// mono at least.
    pub fn capture_channels(&self) -> u16 {
        self.max_channels.clamp(1, 2)
    }
}

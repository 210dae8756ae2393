use std::sync::Arc;

use crate::models::block::PcmBlock;
use crate::models::device::DeviceHandle;
use crate::models::error::RecordError;

/// Callback handed one captured block at a time.
///
/// Fires on a thread owned by the platform audio subsystem — keep the
/// work minimal: the engine's callbacks apply gain in place and perform
/// exactly one non-blocking queue push.
pub type BlockCallback = Arc<dyn Fn(PcmBlock) + Send + Sync + 'static>;

/// One opened capture stream.
///
/// Streams are opened stopped; the session starts them only once the
/// writer threads are ready to consume. Dropping the stream releases the
/// underlying device.
pub trait CaptureStream: Send {
    /// Begin (or resume) block delivery.
    fn start(&mut self) -> Result<(), RecordError>;

    /// Stop delivery at the hardware level. The stream stays open and
    /// can be started again.
    fn stop(&mut self) -> Result<(), RecordError>;
}

/// Platform audio subsystem: endpoint enumeration and stream opening.
pub trait CaptureBackend {
    /// All input-capable endpoints, in host enumeration order.
    fn input_devices(&self) -> Result<Vec<DeviceHandle>, RecordError>;

    /// Endpoints that capture the mix played on an output device.
    fn loopback_devices(&self) -> Result<Vec<DeviceHandle>, RecordError>;

    /// The default output endpoint, if the host has one.
    fn default_output(&self) -> Result<Option<DeviceHandle>, RecordError>;

    /// Open `device` for capture with `min(2, max_channels)` channels at
    /// its native rate, delivering `block_frames`-frame blocks to
    /// `callback`. The returned stream is stopped.
    fn open_stream(
        &self,
        device: &DeviceHandle,
        block_frames: usize,
        callback: BlockCallback,
    ) -> Result<Box<dyn CaptureStream>, RecordError>;
}

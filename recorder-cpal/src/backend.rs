//! Endpoint enumeration over the default cpal host.

use cpal::traits::{DeviceTrait, HostTrait};

use recorder_core::{BlockCallback, CaptureBackend, CaptureStream, DeviceHandle, DeviceRole, RecordError};

use crate::stream::CpalCaptureStream;

/// Name fragments that mark an input endpoint as a mirror of an output
/// (PulseAudio monitors, loopback driver endpoints).
const LOOPBACK_MARKERS: &[&str] = &["loopback", "monitor"];

/// Capture backend over the host's default cpal audio host.
pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Re-resolve a handle to a live cpal device by name. Enumeration
    /// indices can shift between resolution and open, so the name is the
    /// durable key; loopback handles may also name an output device.
    fn find_device(&self, handle: &DeviceHandle) -> Result<cpal::Device, RecordError> {
        if let Ok(inputs) = self.host.input_devices() {
            for device in inputs {
                if device.name().map(|name| name == handle.name).unwrap_or(false) {
                    return Ok(device);
                }
            }
        }
        if handle.role == DeviceRole::LoopbackOutput {
            if let Ok(outputs) = self.host.output_devices() {
                for device in outputs {
                    if device.name().map(|name| name == handle.name).unwrap_or(false) {
                        return Ok(device);
                    }
                }
            }
        }
        Err(RecordError::DeviceNotFound(handle.name.clone()))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_input(index: usize, device: &cpal::Device) -> Option<DeviceHandle> {
    let name = device.name().ok()?;
    let config = device.default_input_config().ok()?;
    Some(DeviceHandle {
        index,
        name,
        sample_rate: config.sample_rate().0,
        max_channels: config.channels(),
        role: DeviceRole::Input,
    })
}

fn is_loopback_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    LOOPBACK_MARKERS.iter().any(|marker| lower.contains(marker))
}

impl CaptureBackend for CpalBackend {
    fn input_devices(&self) -> Result<Vec<DeviceHandle>, RecordError> {
        let devices = self.host.input_devices().map_err(|e| {
            RecordError::DeviceNotFound(format!("input enumeration failed: {}", e))
        })?;
        Ok(devices
            .enumerate()
            .filter_map(|(index, device)| describe_input(index, &device))
            .collect())
    }

    fn loopback_devices(&self) -> Result<Vec<DeviceHandle>, RecordError> {
        Ok(self
            .input_devices()?
            .into_iter()
            .filter(|device| is_loopback_name(&device.name))
            .map(|device| DeviceHandle {
                role: DeviceRole::LoopbackOutput,
                ..device
            })
            .collect())
    }

    fn default_output(&self) -> Result<Option<DeviceHandle>, RecordError> {
        let Some(device) = self.host.default_output_device() else {
            return Ok(None);
        };
        let Ok(name) = device.name() else {
            return Ok(None);
        };
        let Ok(config) = device.default_output_config() else {
            return Ok(None);
        };
        Ok(Some(DeviceHandle {
            index: 0,
            name,
            sample_rate: config.sample_rate().0,
            max_channels: config.channels(),
            role: DeviceRole::LoopbackOutput,
        }))
    }

    fn open_stream(
        &self,
        device: &DeviceHandle,
        block_frames: usize,
        callback: BlockCallback,
    ) -> Result<Box<dyn CaptureStream>, RecordError> {
        let cpal_device = self.find_device(device)?;
        let stream = CpalCaptureStream::open(cpal_device, device.clone(), block_frames, callback)?;
        Ok(Box::new(stream))
    }
}

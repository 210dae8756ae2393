//! Capture stream over a dedicated stream-owner thread.
//!
//! `cpal::Stream` is not `Send`, so each stream lives on the thread that
//! built it and is driven through a small command channel. Every command
//! is acknowledged, so open and start/stop failures surface synchronously
//! to the session.

use std::thread;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use recorder_core::{BlockCallback, CaptureStream, DeviceHandle, DeviceRole, PcmBlock, RecordError};

enum StreamCommand {
    Play,
    Pause,
    Shutdown,
}

/// One open cpal capture stream, stopped until `start()`.
pub struct CpalCaptureStream {
    device: DeviceHandle,
    commands: Sender<StreamCommand>,
    acks: Receiver<Result<(), String>>,
    owner: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalCaptureStream {
    /// Build the stream on its owner thread. Blocks until the thread
    /// reports whether the device opened.
    pub fn open(
        cpal_device: cpal::Device,
        handle: DeviceHandle,
        block_frames: usize,
        callback: BlockCallback,
    ) -> Result<Self, RecordError> {
        let (command_tx, command_rx) = bounded::<StreamCommand>(4);
        let (ack_tx, ack_rx) = bounded::<Result<(), String>>(4);

        let thread_device = handle.clone();
        let owner = thread::Builder::new()
            .name("cpal-capture".into())
            .spawn(move || {
                stream_owner_loop(cpal_device, thread_device, block_frames, callback, command_rx, ack_tx)
            })
            .map_err(|e| RecordError::StreamOpen(format!("failed to spawn capture thread: {}", e)))?;

        // The first ack is the build result.
        match ack_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = owner.join();
                return Err(RecordError::StreamOpen(e));
            }
            Err(_) => {
                let _ = owner.join();
                return Err(RecordError::StreamOpen(
                    "capture thread exited before reporting".into(),
                ));
            }
        }

        log::info!("capture stream ready: {}", handle.name);
        Ok(Self {
            device: handle,
            commands: command_tx,
            acks: ack_rx,
            owner: Mutex::new(Some(owner)),
        })
    }

    fn command(&self, command: StreamCommand) -> Result<(), RecordError> {
        self.commands
            .send(command)
            .map_err(|_| RecordError::StreamOpen(format!("{}: capture thread is gone", self.device.name)))?;
        match self.acks.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RecordError::StreamOpen(e)),
            Err(_) => Err(RecordError::StreamOpen(format!(
                "{}: capture thread is gone",
                self.device.name
            ))),
        }
    }
}

impl CaptureStream for CpalCaptureStream {
    fn start(&mut self) -> Result<(), RecordError> {
        self.command(StreamCommand::Play)
    }

    fn stop(&mut self) -> Result<(), RecordError> {
        self.command(StreamCommand::Pause)
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        let _ = self.commands.send(StreamCommand::Shutdown);
        if let Some(owner) = self.owner.lock().take() {
            let _ = owner.join();
        }
    }
}

/// Owns the `cpal::Stream` for its whole life and answers commands.
fn stream_owner_loop(
    device: cpal::Device,
    handle: DeviceHandle,
    block_frames: usize,
    callback: BlockCallback,
    commands: Receiver<StreamCommand>,
    acks: Sender<Result<(), String>>,
) {
    let stream = match build_stream(&device, &handle, block_frames, callback) {
        Ok(stream) => {
            let _ = acks.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = acks.send(Err(e));
            return;
        }
    };

    loop {
        match commands.recv() {
            Ok(StreamCommand::Play) => {
                let _ = acks.send(
                    stream
                        .play()
                        .map_err(|e| format!("failed to start {}: {}", handle.name, e)),
                );
            }
            Ok(StreamCommand::Pause) => {
                let _ = acks.send(
                    stream
                        .pause()
                        .map_err(|e| format!("failed to stop {}: {}", handle.name, e)),
                );
            }
            Ok(StreamCommand::Shutdown) | Err(_) => break,
        }
    }
    drop(stream);
    log::debug!("capture thread exiting: {}", handle.name);
}

fn build_stream(
    device: &cpal::Device,
    handle: &DeviceHandle,
    block_frames: usize,
    callback: BlockCallback,
) -> Result<cpal::Stream, String> {
    // A loopback handle may point at a render device: its format comes
    // from the output side, and opening an input stream on it is what
    // makes the host capture the playback mix.
    let supported = match handle.role {
        DeviceRole::Input => device.default_input_config(),
        DeviceRole::LoopbackOutput => device
            .default_input_config()
            .or_else(|_| device.default_output_config()),
    }
    .map_err(|e| format!("no supported config for {}: {}", handle.name, e))?;

    let config = StreamConfig {
        channels: handle.capture_channels(),
        sample_rate: cpal::SampleRate(handle.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    log::info!(
        "opening {} at {} Hz, {} ch, {:?}",
        handle.name,
        handle.sample_rate,
        config.channels,
        supported.sample_format()
    );

    match supported.sample_format() {
        SampleFormat::I16 => build_typed::<i16>(device, &config, block_frames, callback),
        SampleFormat::U16 => build_typed::<u16>(device, &config, block_frames, callback),
        SampleFormat::F32 => build_typed::<f32>(device, &config, block_frames, callback),
        other => Err(format!("unsupported sample format {:?} on {}", other, handle.name)),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    block_frames: usize,
    callback: BlockCallback,
) -> Result<cpal::Stream, String>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels;
    let sample_rate = config.sample_rate.0;
    let block_len = block_frames * usize::from(channels);
    let mut pending: Vec<i16> = Vec::with_capacity(block_len);

    let data_callback = move |data: &[T], _: &cpal::InputCallbackInfo| {
        for &sample in data {
            pending.push(to_i16(sample));
            if pending.len() == block_len {
                let samples = std::mem::replace(&mut pending, Vec::with_capacity(block_len));
                callback(PcmBlock::new(samples, channels, sample_rate));
            }
        }
    };
    let err_callback = |err: cpal::StreamError| log::error!("capture stream error: {}", err);

    let stream = device
        .build_input_stream(config, data_callback, err_callback, None)
        .map_err(|e| e.to_string())?;

    // Streams are handed back stopped; some hosts start on build.
    let _ = stream.pause();
    Ok(stream)
}

/// Convert any delivered sample type to signed 16-bit.
fn to_i16<T>(sample: T) -> i16
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let value: f32 = f32::from_sample(sample);
    (value.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

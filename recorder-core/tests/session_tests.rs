//! Recording session scenarios over a scripted fake backend.
//!
//! The fake backend produces constant-valued blocks at a fixed cadence
//! while its streams are started, and counts open streams so teardown
//! can be asserted exactly.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use recorder_core::sink::sha256_file;
use recorder_core::{
    BlockCallback, CaptureBackend, CaptureStream, DeviceHandle, DeviceRole, OutputFormat,
    PcmBlock, RecordError, RecordingConfig, RecordingMode, RecordingSession, SessionState,
    TrackKind,
};

const BLOCK_FRAMES: usize = 64;
const SYSTEM_VALUE: i16 = 100;
const MIC_VALUE: i16 = 200;

fn mic_device() -> DeviceHandle {
    DeviceHandle {
        index: 0,
        name: "USB Microphone".into(),
        sample_rate: 48_000,
        max_channels: 1,
        role: DeviceRole::Input,
    }
}

fn loopback_device() -> DeviceHandle {
    DeviceHandle {
        index: 1,
        name: "Speakers (Fake Audio) [Loopback]".into(),
        sample_rate: 48_000,
        max_channels: 1,
        role: DeviceRole::LoopbackOutput,
    }
}

fn default_output() -> DeviceHandle {
    DeviceHandle {
        index: 0,
        name: "Speakers (Fake Audio)".into(),
        sample_rate: 48_000,
        max_channels: 2,
        role: DeviceRole::LoopbackOutput,
    }
}

/// Constant-signal capture stream on its own producer thread.
struct FakeStream {
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    open_count: Arc<AtomicUsize>,
    producer: Option<thread::JoinHandle<()>>,
}

impl FakeStream {
    fn spawn(
        device: &DeviceHandle,
        block_frames: usize,
        callback: BlockCallback,
        open_count: Arc<AtomicUsize>,
        value: i16,
    ) -> Self {
        open_count.fetch_add(1, Ordering::SeqCst);
        let running = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let channels = device.capture_channels();
        let sample_rate = device.sample_rate;

        let running_flag = Arc::clone(&running);
        let shutdown_flag = Arc::clone(&shutdown);
        let producer = thread::spawn(move || {
            while !shutdown_flag.load(Ordering::SeqCst) {
                if running_flag.load(Ordering::SeqCst) {
                    let samples = vec![value; block_frames * usize::from(channels)];
                    callback(PcmBlock::new(samples, channels, sample_rate));
                }
                thread::sleep(Duration::from_millis(2));
            }
        });

        Self {
            running,
            shutdown,
            open_count,
            producer: Some(producer),
        }
    }
}

impl CaptureStream for FakeStream {
    fn start(&mut self) -> Result<(), RecordError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
        self.open_count.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FakeBackend {
    inputs: Vec<DeviceHandle>,
    loopbacks: Vec<DeviceHandle>,
    default_out: Option<DeviceHandle>,
    open_streams: Arc<AtomicUsize>,
    /// Device name whose open should fail, for rollback scenarios.
    fail_open_for: Option<String>,
}

impl FakeBackend {
    fn with_both_sources() -> Self {
        Self {
            inputs: vec![mic_device()],
            loopbacks: vec![loopback_device()],
            default_out: Some(default_output()),
            open_streams: Arc::new(AtomicUsize::new(0)),
            fail_open_for: None,
        }
    }

    fn open_stream_count(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for FakeBackend {
    fn input_devices(&self) -> Result<Vec<DeviceHandle>, RecordError> {
        Ok(self.inputs.clone())
    }

    fn loopback_devices(&self) -> Result<Vec<DeviceHandle>, RecordError> {
        Ok(self.loopbacks.clone())
    }

    fn default_output(&self) -> Result<Option<DeviceHandle>, RecordError> {
        Ok(self.default_out.clone())
    }

    fn open_stream(
        &self,
        device: &DeviceHandle,
        block_frames: usize,
        callback: BlockCallback,
    ) -> Result<Box<dyn CaptureStream>, RecordError> {
        if self.fail_open_for.as_deref() == Some(device.name.as_str()) {
            return Err(RecordError::StreamOpen(format!(
                "{}: device unplugged",
                device.name
            )));
        }
        let value = match device.role {
            DeviceRole::LoopbackOutput => SYSTEM_VALUE,
            DeviceRole::Input => MIC_VALUE,
        };
        Ok(Box::new(FakeStream::spawn(
            device,
            block_frames,
            callback,
            Arc::clone(&self.open_streams),
            value,
        )))
    }
}

fn wav_config(dir: &Path, mode: RecordingMode) -> RecordingConfig {
    RecordingConfig {
        format: OutputFormat::Wav,
        output_directory: dir.to_path_buf(),
        mode,
        block_frames: BLOCK_FRAMES,
        ..Default::default()
    }
}

fn read_wav(path: &Path) -> (u32, u16, Vec<i16>) {
    let data = fs::read(path).unwrap();
    assert!(data.len() >= 44, "file shorter than a WAV header");
    assert_eq!(&data[0..4], b"RIFF");
    assert_eq!(&data[8..12], b"WAVE");

    let channels = u16::from_le_bytes([data[22], data[23]]);
    let sample_rate = u32::from_le_bytes([data[24], data[25], data[26], data[27]]);
    let data_size = u32::from_le_bytes([data[40], data[41], data[42], data[43]]) as usize;
    assert_eq!(data_size, data.len() - 44, "header data size disagrees with file");

    let samples = data[44..]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    (sample_rate, channels, samples)
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn mic_only_wav_produces_one_valid_container() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = RecordingSession::new(FakeBackend::with_both_sources());

    session
        .start(wav_config(dir.path(), RecordingMode::MicrophoneOnly))
        .unwrap();
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.backend().open_stream_count(), 1);

    thread::sleep(Duration::from_millis(80));
    let outcome = session.stop().unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.backend().open_stream_count(), 0);

    assert_eq!(outcome.tracks.len(), 1);
    let track = &outcome.tracks[0];
    assert_eq!(track.kind, TrackKind::Microphone);
    assert!(track.path.is_file());

    let (sample_rate, channels, samples) = read_wav(&track.path);
    assert_eq!(sample_rate, 48_000);
    assert_eq!(channels, 1);
    assert!(!samples.is_empty());
    assert!(samples.iter().all(|&sample| sample == MIC_VALUE));

    // Every block the writer counted is in the file, in full.
    let block_bytes = BLOCK_FRAMES * 2;
    assert_eq!(samples.len() * 2, outcome.stats.blocks_written as usize * block_bytes);
    assert_eq!(outcome.stats.overflow_drops, 0);
    assert_eq!(outcome.stats.write_errors, 0);

    assert_eq!(track.checksum.as_deref(), Some(sha256_file(&track.path).unwrap().as_str()));
    assert!(track.path.with_extension("metadata.json").is_file());
    assert!(outcome.duration_secs > 0.0);
}

#[test]
fn separate_mode_produces_independent_system_and_mic_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = RecordingSession::new(FakeBackend::with_both_sources());

    session
        .start(wav_config(dir.path(), RecordingMode::SystemAndMicSeparate))
        .unwrap();
    assert_eq!(session.backend().open_stream_count(), 2);

    thread::sleep(Duration::from_millis(80));
    let outcome = session.stop().unwrap();

    assert_eq!(outcome.tracks.len(), 2);
    let system = outcome
        .tracks
        .iter()
        .find(|track| track.kind == TrackKind::System)
        .unwrap();
    let mic = outcome
        .tracks
        .iter()
        .find(|track| track.kind == TrackKind::Microphone)
        .unwrap();

    assert!(system.path.to_string_lossy().contains("recording_system_"));
    assert!(mic.path.to_string_lossy().contains("recording_mic_"));

    let (_, _, system_samples) = read_wav(&system.path);
    let (_, _, mic_samples) = read_wav(&mic.path);
    assert!(system_samples.iter().all(|&sample| sample == SYSTEM_VALUE));
    assert!(mic_samples.iter().all(|&sample| sample == MIC_VALUE));

    assert_eq!(session.backend().open_stream_count(), 0);
}

#[test]
fn merged_mode_mixes_both_sources_into_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = RecordingSession::new(FakeBackend::with_both_sources());

    session
        .start(wav_config(dir.path(), RecordingMode::SystemAndMicMerged))
        .unwrap();
    assert_eq!(session.backend().open_stream_count(), 2);

    thread::sleep(Duration::from_millis(100));
    let outcome = session.stop().unwrap();

    assert_eq!(outcome.tracks.len(), 1);
    assert_eq!(outcome.tracks[0].kind, TrackKind::Mixed);

    // 0.7 * 100 + 0.7 * 200, truncated
    let expected = (f32::from(SYSTEM_VALUE) * 0.7 + f32::from(MIC_VALUE) * 0.7) as i16;
    let (_, _, samples) = read_wav(&outcome.tracks[0].path);
    assert!(!samples.is_empty());
    assert!(samples.iter().all(|&sample| sample == expected));

    assert_eq!(session.backend().open_stream_count(), 0);
}

#[test]
fn gain_is_applied_inside_the_capture_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = RecordingSession::new(FakeBackend::with_both_sources());

    let config = RecordingConfig {
        microphone_gain: 5, // 2.5x
        ..wav_config(dir.path(), RecordingMode::MicrophoneOnly)
    };
    session.start(config).unwrap();
    thread::sleep(Duration::from_millis(60));
    let outcome = session.stop().unwrap();

    let (_, _, samples) = read_wav(&outcome.tracks[0].path);
    assert!(!samples.is_empty());
    assert!(samples.iter().all(|&sample| sample == MIC_VALUE * 5 / 2));
}

#[test]
fn invalid_transitions_error_and_leave_state_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = RecordingSession::new(FakeBackend::with_both_sources());

    // Nothing is running yet.
    assert!(matches!(session.pause(), Err(RecordError::InvalidState { .. })));
    assert!(matches!(session.resume(), Err(RecordError::InvalidState { .. })));
    assert!(matches!(session.stop(), Err(RecordError::InvalidState { .. })));
    assert_eq!(session.state(), SessionState::Idle);

    session
        .start(wav_config(dir.path(), RecordingMode::MicrophoneOnly))
        .unwrap();

    // A second recording cannot start while one is active.
    let second = session.start(wav_config(dir.path(), RecordingMode::MicrophoneOnly));
    assert!(matches!(second, Err(RecordError::InvalidState { .. })));
    assert_eq!(session.state(), SessionState::Running);

    // Resume only follows pause.
    assert!(matches!(session.resume(), Err(RecordError::InvalidState { .. })));
    assert_eq!(session.state(), SessionState::Running);

    session.pause().unwrap();
    assert!(matches!(session.pause(), Err(RecordError::InvalidState { .. })));
    assert_eq!(session.state(), SessionState::Paused);

    session.resume().unwrap();
    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn failed_stream_open_rolls_back_everything() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FakeBackend::with_both_sources();
    backend.fail_open_for = Some(mic_device().name);
    let mut session = RecordingSession::new(backend);

    let result = session.start(wav_config(dir.path(), RecordingMode::SystemAndMicMerged));
    assert!(matches!(result, Err(RecordError::StreamOpen(_))));

    // Nothing stays behind: no streams, no threads holding sinks, no
    // partial files.
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.backend().open_stream_count(), 0);
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn missing_device_fails_start_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeBackend {
        inputs: vec![],
        loopbacks: vec![],
        default_out: None,
        open_streams: Arc::new(AtomicUsize::new(0)),
        fail_open_for: None,
    };
    let mut session = RecordingSession::new(backend);

    let result = session.start(wav_config(dir.path(), RecordingMode::MicrophoneOnly));
    assert!(matches!(result, Err(RecordError::DeviceNotFound(_))));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn missing_encoder_fails_start_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = RecordingSession::new(FakeBackend::with_both_sources());

    let config = RecordingConfig {
        format: OutputFormat::Mp3,
        encoder_path: "/no/such/encoder".into(),
        ..wav_config(dir.path(), RecordingMode::MicrophoneOnly)
    };
    let result = session.start(config);
    assert!(matches!(result, Err(RecordError::EncoderLaunch(_))));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.backend().open_stream_count(), 0);
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn pause_excludes_time_and_loses_no_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = RecordingSession::new(FakeBackend::with_both_sources());

    let begin = Instant::now();
    session
        .start(wav_config(dir.path(), RecordingMode::MicrophoneOnly))
        .unwrap();
    thread::sleep(Duration::from_millis(60));

    session.pause().unwrap();
    assert_eq!(session.state(), SessionState::Paused);
    // Writers keep draining during the pause; capture produces nothing.
    thread::sleep(Duration::from_millis(150));

    session.resume().unwrap();
    assert_eq!(session.state(), SessionState::Running);
    thread::sleep(Duration::from_millis(60));

    let outcome = session.stop().unwrap();
    let wall_secs = begin.elapsed().as_secs_f64();

    // Paused time is excluded from the reported duration.
    assert!(outcome.duration_secs > 0.05);
    assert!(
        outcome.duration_secs < wall_secs - 0.1,
        "duration {} should exclude the {}s pause (wall {})",
        outcome.duration_secs,
        0.15,
        wall_secs
    );

    // No blocks were dropped or duplicated across the pause boundary:
    // the file holds exactly the blocks the writer accepted.
    let (_, _, samples) = read_wav(&outcome.tracks[0].path);
    assert_eq!(
        samples.len(),
        outcome.stats.blocks_written as usize * BLOCK_FRAMES
    );
    assert_eq!(outcome.stats.overflow_drops, 0);
}

#[cfg(unix)]
#[test]
fn compressed_format_streams_through_the_encoder_process() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("fake-encoder.sh");
    fs::write(&script, "#!/bin/sh\nfor last; do :; done\ncat > \"$last\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let out_dir = dir.path().join("recordings");
    let mut session = RecordingSession::new(FakeBackend::with_both_sources());
    let config = RecordingConfig {
        format: OutputFormat::Mp3,
        encoder_path: script,
        ..wav_config(&out_dir, RecordingMode::MicrophoneOnly)
    };

    session.start(config).unwrap();
    thread::sleep(Duration::from_millis(80));
    let outcome = session.stop().unwrap();

    let track = &outcome.tracks[0];
    assert!(track.path.extension().unwrap() == "mp3");
    assert!(track.path.is_file());
    assert!(track.checksum.is_some());

    // The stand-in encoder copies stdin verbatim, so the "encoded" file
    // is the raw PCM the writer piped in.
    let piped = fs::read(&track.path).unwrap();
    assert_eq!(piped.len(), outcome.stats.blocks_written as usize * BLOCK_FRAMES * 2);
    assert!(piped
        .chunks_exact(2)
        .all(|pair| i16::from_le_bytes([pair[0], pair[1]]) == MIC_VALUE));
}

//! Recording session orchestration.
//!
//! Owns device resolution, capture streams, block queues, and sink writer
//! threads for one recording. Data flow in merged mode:
//!
//! ```text
//! [System Stream] → gain → [BlockQueue] ─┐
//!                                         ├→ mix → [SinkWriter]
//! [Mic Stream]    → gain → [BlockQueue] ─┘
//! ```
//!
//! Separate mode runs two independent queue → sink chains; the
//! single-source modes run one. Control calls (`start`/`pause`/`resume`/
//! `stop`) must be serialized by the caller; the block queues are the only
//! state shared with the capture and writer threads.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::block_queue::{block_queue, BlockConsumer, BlockProducer};
use crate::models::block::PcmBlock;
use crate::models::config::{RecordingConfig, RecordingMode};
use crate::models::device::DeviceHandle;
use crate::models::error::RecordError;
use crate::models::outcome::{
    RecordedTrack, RecordingMetadata, RecordingOutcome, SessionStats, TrackKind,
};
use crate::models::state::SessionState;
use crate::processing::{gain, mixer};
use crate::select;
use crate::sink::{metadata, SinkWriter};
use crate::traits::capture::{BlockCallback, CaptureBackend, CaptureStream};

/// How long a writer thread waits on an empty queue before rechecking the
/// stop flag.
const POP_TIMEOUT: Duration = Duration::from_millis(100);

/// Counters the writer threads update and the control thread reads after
/// stop. Worker failures land here instead of crossing thread boundaries.
#[derive(Default)]
struct WriterCounters {
    blocks_written: AtomicU64,
    write_errors: AtomicU64,
    unpaired_discards: AtomicU64,
    first_write_error: Mutex<Option<String>>,
}

/// Everything a running recording owns. Dropped (fully torn down) when
/// `stop()` completes or `start()` rolls back.
struct ActiveRecording {
    config: RecordingConfig,
    streams: Vec<Box<dyn CaptureStream>>,
    writers: Vec<(TrackKind, thread::JoinHandle<SinkWriter>)>,
    stop_flag: Arc<AtomicBool>,
    counters: Arc<WriterCounters>,
    overflow_counters: Vec<Arc<AtomicU64>>,
    capture_start: Instant,
    paused_total: Duration,
    pause_began: Option<Instant>,
}

/// One live recording session over a capture backend.
///
/// At most one recording is in flight per session: `start()` from any
/// state but idle is an error. There is no process-wide instance; callers
/// own the session and pass it where it is needed.
pub struct RecordingSession<B: CaptureBackend> {
    backend: B,
    state: SessionState,
    active: Option<ActiveRecording>,
}

impl<B: CaptureBackend> RecordingSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: SessionState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Start a recording. Valid only from idle. On any device, sink, or
    /// stream failure everything opened so far is torn down (partial
    /// output files included) before the error returns, and the session
    /// is idle again.
    pub fn start(&mut self, config: RecordingConfig) -> Result<(), RecordError> {
        if !self.state.is_idle() {
            return Err(RecordError::InvalidState {
                op: "start",
                state: self.state.name(),
            });
        }
        config.validate()?;

        self.state = SessionState::Starting;
        match self.start_inner(config) {
            Ok(active) => {
                self.active = Some(active);
                self.state = SessionState::Running;
                log::info!("recording started");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Idle;
                log::error!("failed to start recording: {}", e);
                Err(e)
            }
        }
    }

    /// Pause a running recording: capture stops at the hardware level,
    /// but the writer threads keep draining whatever is still queued and
    /// the sinks (encoder process included) stay open.
    pub fn pause(&mut self) -> Result<(), RecordError> {
        if !self.state.is_running() {
            return Err(RecordError::InvalidState {
                op: "pause",
                state: self.state.name(),
            });
        }
        let active = match self.active.as_mut() {
            Some(active) => active,
            None => {
                return Err(RecordError::InvalidState {
                    op: "pause",
                    state: self.state.name(),
                })
            }
        };

        self.state = SessionState::Pausing;
        for stream in &mut active.streams {
            if let Err(e) = stream.stop() {
                log::warn!("capture stream failed to pause: {}", e);
            }
        }
        active.pause_began = Some(Instant::now());
        self.state = SessionState::Paused;
        log::info!("recording paused");
        Ok(())
    }

    /// Resume a paused recording by restarting the capture streams.
    pub fn resume(&mut self) -> Result<(), RecordError> {
        if !self.state.is_paused() {
            return Err(RecordError::InvalidState {
                op: "resume",
                state: self.state.name(),
            });
        }
        let active = match self.active.as_mut() {
            Some(active) => active,
            None => {
                return Err(RecordError::InvalidState {
                    op: "resume",
                    state: self.state.name(),
                })
            }
        };

        self.state = SessionState::Resuming;
        for stream in &mut active.streams {
            if let Err(e) = stream.start() {
                // Writers keep draining; the recording continues with
                // whichever streams did restart.
                log::error!("capture stream failed to resume: {}", e);
            }
        }
        if let Some(pause_began) = active.pause_began.take() {
            active.paused_total += pause_began.elapsed();
        }
        self.state = SessionState::Running;
        log::info!("recording resumed");
        Ok(())
    }

    /// Stop the recording: capture streams stop, writer threads drain
    /// their queues and exit, sinks are finalized (waiting out the
    /// encoder with a bounded timeout). Returns the finalized tracks.
    pub fn stop(&mut self) -> Result<RecordingOutcome, RecordError> {
        if !self.state.is_active() {
            return Err(RecordError::InvalidState {
                op: "stop",
                state: self.state.name(),
            });
        }
        let mut active = match self.active.take() {
            Some(active) => active,
            None => {
                return Err(RecordError::InvalidState {
                    op: "stop",
                    state: self.state.name(),
                })
            }
        };

        self.state = SessionState::Stopping;

        if let Some(pause_began) = active.pause_began.take() {
            active.paused_total += pause_began.elapsed();
        }
        let duration_secs = active
            .capture_start
            .elapsed()
            .saturating_sub(active.paused_total)
            .as_secs_f64();

        // Stop capture first so nothing new is queued, then signal the
        // writers, which drain what remains before exiting.
        for stream in &mut active.streams {
            if let Err(e) = stream.stop() {
                log::warn!("capture stream failed to stop: {}", e);
            }
        }
        active.stop_flag.store(true, Ordering::SeqCst);

        let mut tracks = Vec::new();
        for (kind, handle) in active.writers {
            let sink = match handle.join() {
                Ok(sink) => sink,
                Err(_) => {
                    log::error!("writer thread panicked");
                    continue;
                }
            };
            let path = sink.path().to_path_buf();
            let checksum = match sink.close() {
                Ok(checksum) => checksum,
                Err(e) => {
                    log::error!("failed to finalize {}: {}", path.display(), e);
                    None
                }
            };
            tracks.push(RecordedTrack {
                kind,
                path,
                checksum,
            });
        }

        // Release the capture devices.
        active.streams.clear();

        let stats = SessionStats {
            blocks_written: active.counters.blocks_written.load(Ordering::Relaxed),
            overflow_drops: active
                .overflow_counters
                .iter()
                .map(|counter| counter.load(Ordering::Relaxed))
                .sum(),
            unpaired_discards: active.counters.unpaired_discards.load(Ordering::Relaxed),
            write_errors: active.counters.write_errors.load(Ordering::Relaxed),
            first_write_error: active.counters.first_write_error.lock().clone(),
        };
        if stats.overflow_drops > 0 {
            log::warn!("{} blocks dropped on queue overflow", stats.overflow_drops);
        }
        if stats.write_errors > 0 {
            log::warn!("{} sink writes failed", stats.write_errors);
        }

        let metadata_record = RecordingMetadata::new(
            active.config.mode,
            active.config.format,
            duration_secs,
            tracks.clone(),
        );
        if let Some(first) = tracks.first() {
            if let Err(e) = metadata::write_sidecar(&metadata_record, &first.path) {
                log::warn!("failed to write metadata sidecar: {}", e);
            }
        }

        self.state = SessionState::Idle;
        log::info!(
            "recording stopped after {:.2}s, {} file(s) finalized",
            duration_secs,
            tracks.len()
        );

        Ok(RecordingOutcome {
            tracks,
            duration_secs,
            stats,
            metadata: metadata_record,
        })
    }

    fn start_inner(&mut self, config: RecordingConfig) -> Result<ActiveRecording, RecordError> {
        let mode = config.mode;
        log::info!("starting recording, mode {:?}, format {:?}", mode, config.format);

        // Resolve the devices this mode needs. Nothing is open yet, so
        // failures here need no rollback.
        let microphone = if mode.needs_microphone() {
            Some(select::resolve_microphone(&self.backend)?)
        } else {
            None
        };
        let system = if mode.needs_system() {
            Some(select::resolve_system_loopback(&self.backend)?)
        } else {
            None
        };

        let timestamp = chrono::Local::now().format("%d-%m-%Y_%H-%M-%S").to_string();
        let file_for = |tag: Option<&str>| -> PathBuf {
            let name = match tag {
                Some(tag) => format!("recording_{}_{}.{}", tag, timestamp, config.format.extension()),
                None => format!("recording_{}.{}", timestamp, config.format.extension()),
            };
            config.output_directory.join(name)
        };

        // One sink per output file; each follows the rate and channel
        // count of the device that feeds it (the system endpoint drives
        // the format in merged mode).
        let plans: Vec<(TrackKind, PathBuf, &DeviceHandle)> =
            match (mode, system.as_ref(), microphone.as_ref()) {
                (RecordingMode::MicrophoneOnly, _, Some(mic)) => {
                    vec![(TrackKind::Microphone, file_for(None), mic)]
                }
                (RecordingMode::SystemOnly, Some(sys), _) => {
                    vec![(TrackKind::System, file_for(None), sys)]
                }
                (RecordingMode::SystemAndMicMerged, Some(sys), _) => {
                    vec![(TrackKind::Mixed, file_for(None), sys)]
                }
                (RecordingMode::SystemAndMicSeparate, Some(sys), Some(mic)) => vec![
                    (TrackKind::System, file_for(Some("system")), sys),
                    (TrackKind::Microphone, file_for(Some("mic")), mic),
                ],
                _ => {
                    return Err(RecordError::DeviceNotFound(
                        "required device was not resolved".into(),
                    ))
                }
            };

        let mut sinks: Vec<(TrackKind, SinkWriter)> = Vec::new();
        for (kind, path, device) in &plans {
            match SinkWriter::open(
                &config,
                path.clone(),
                device.sample_rate,
                device.capture_channels(),
            ) {
                Ok(sink) => sinks.push((*kind, sink)),
                Err(e) => {
                    abort_sinks(sinks);
                    return Err(e);
                }
            }
        }

        // Open the capture streams (still stopped) with their queues.
        let mut system_parts = None;
        if let Some(device) = system.as_ref() {
            match open_source(&self.backend, &config, device, config.system_gain) {
                Ok(parts) => system_parts = Some(parts),
                Err(e) => {
                    abort_sinks(sinks);
                    return Err(e);
                }
            }
        }
        let mut mic_parts = None;
        if let Some(device) = microphone.as_ref() {
            match open_source(&self.backend, &config, device, config.microphone_gain) {
                Ok(parts) => mic_parts = Some(parts),
                Err(e) => {
                    // Dropping system_parts closes its stream.
                    abort_sinks(sinks);
                    return Err(e);
                }
            }
        }

        // Writer threads take ownership of the sinks and queue consumers,
        // then the capture streams start — last, so every block produced
        // has somewhere to drain to.
        let stop_flag = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(WriterCounters::default());
        let mut streams: Vec<Box<dyn CaptureStream>> = Vec::new();
        let mut overflow_counters = Vec::new();
        let mut writers = Vec::new();

        if mode.is_merged() {
            let (sys_stream, sys_consumer, sys_drops) = match system_parts.take() {
                Some(parts) => parts,
                None => {
                    abort_sinks(sinks);
                    return Err(RecordError::DeviceNotFound("system stream missing".into()));
                }
            };
            let (mic_stream, mic_consumer, mic_drops) = match mic_parts.take() {
                Some(parts) => parts,
                None => {
                    abort_sinks(sinks);
                    return Err(RecordError::DeviceNotFound("mic stream missing".into()));
                }
            };
            let (kind, sink) = match sinks.pop() {
                Some(entry) => entry,
                None => return Err(RecordError::SinkOpen("no sink was opened".into())),
            };

            writers.push((
                kind,
                spawn_merged_writer(
                    sink,
                    sys_consumer,
                    mic_consumer,
                    Arc::clone(&stop_flag),
                    Arc::clone(&counters),
                ),
            ));
            streams.push(sys_stream);
            streams.push(mic_stream);
            overflow_counters.push(sys_drops);
            overflow_counters.push(mic_drops);
        } else {
            // Single-source and separate modes: one independent writer
            // per open stream. `plans` ordered system first for separate
            // mode, matching the order the parts were opened in.
            let mut parts = Vec::new();
            if let Some(sys) = system_parts.take() {
                parts.push(sys);
            }
            if let Some(mic) = mic_parts.take() {
                parts.push(mic);
            }
            if parts.len() != sinks.len() {
                abort_sinks(sinks);
                return Err(RecordError::SinkOpen(
                    "stream and sink counts diverged".into(),
                ));
            }

            for ((kind, sink), (stream, consumer, drops)) in sinks.into_iter().zip(parts) {
                writers.push((
                    kind,
                    spawn_single_writer(
                        kind,
                        sink,
                        consumer,
                        Arc::clone(&stop_flag),
                        Arc::clone(&counters),
                    ),
                ));
                streams.push(stream);
                overflow_counters.push(drops);
            }
        }

        let mut start_error = None;
        for stream in streams.iter_mut() {
            if let Err(e) = stream.start() {
                start_error = Some(e);
                break;
            }
        }
        if let Some(e) = start_error {
            log::error!("capture stream failed to start: {}", e);
            for stream in streams.iter_mut() {
                let _ = stream.stop();
            }
            stop_flag.store(true, Ordering::SeqCst);
            for (_, handle) in writers {
                if let Ok(sink) = handle.join() {
                    sink.abort();
                }
            }
            return Err(e);
        }

        Ok(ActiveRecording {
            config,
            streams,
            writers,
            stop_flag,
            counters,
            overflow_counters,
            capture_start: Instant::now(),
            paused_total: Duration::ZERO,
            pause_began: None,
        })
    }
}

fn abort_sinks(sinks: Vec<(TrackKind, SinkWriter)>) {
    for (_, sink) in sinks {
        sink.abort();
    }
}

/// Open one source: its queue and its (stopped) capture stream, with the
/// gain stage wired into the callback.
fn open_source<B: CaptureBackend>(
    backend: &B,
    config: &RecordingConfig,
    device: &DeviceHandle,
    gain_level: u8,
) -> Result<(Box<dyn CaptureStream>, BlockConsumer, Arc<AtomicU64>), RecordError> {
    let (producer, consumer) = block_queue(config.queue_capacity);
    let drops = producer.drop_counter();
    let stream = backend.open_stream(device, config.block_frames, capture_callback(gain_level, producer))?;
    log::info!(
        "capture stream opened: {} ({} Hz, {} ch)",
        device.name,
        device.sample_rate,
        device.capture_channels()
    );
    Ok((stream, consumer, drops))
}

/// The whole of the realtime path: gain in place, one wait-free push.
/// Overflow is counted by the producer; no logging or I/O happens here.
fn capture_callback(gain_level: u8, producer: BlockProducer) -> BlockCallback {
    Arc::new(move |mut block: PcmBlock| {
        gain::apply_gain(&mut block.samples, gain_level);
        producer.try_push(block);
    })
}

fn spawn_single_writer(
    kind: TrackKind,
    sink: SinkWriter,
    consumer: BlockConsumer,
    stop: Arc<AtomicBool>,
    counters: Arc<WriterCounters>,
) -> thread::JoinHandle<SinkWriter> {
    let name = match kind {
        TrackKind::System => "sink-writer-system",
        TrackKind::Microphone => "sink-writer-mic",
        TrackKind::Mixed => "sink-writer",
    };
    thread::Builder::new()
        .name(name.into())
        .spawn(move || drain_single(sink, consumer, stop, counters))
        .expect("failed to spawn writer thread")
}

fn spawn_merged_writer(
    sink: SinkWriter,
    system: BlockConsumer,
    mic: BlockConsumer,
    stop: Arc<AtomicBool>,
    counters: Arc<WriterCounters>,
) -> thread::JoinHandle<SinkWriter> {
    thread::Builder::new()
        .name("sink-writer".into())
        .spawn(move || drain_merged(sink, system, mic, stop, counters))
        .expect("failed to spawn writer thread")
}

/// Drain one queue into one sink until stopped and empty.
fn drain_single(
    mut sink: SinkWriter,
    consumer: BlockConsumer,
    stop: Arc<AtomicBool>,
    counters: Arc<WriterCounters>,
) -> SinkWriter {
    loop {
        match consumer.pop(POP_TIMEOUT) {
            Some(block) => write_block(&mut sink, &block, &counters),
            None => {
                if stop.load(Ordering::SeqCst) && consumer.is_empty() {
                    break;
                }
            }
        }
    }
    log::debug!("writer exiting: {}", sink.path().display());
    sink
}

/// Drain both queues through the mixer into one sink. Blocks pair by pop
/// order; an iteration that gets only one side's block discards it rather
/// than stalling on a stuck source.
fn drain_merged(
    mut sink: SinkWriter,
    system: BlockConsumer,
    mic: BlockConsumer,
    stop: Arc<AtomicBool>,
    counters: Arc<WriterCounters>,
) -> SinkWriter {
    loop {
        let system_block = match system.pop(POP_TIMEOUT) {
            Some(block) => block,
            None => {
                if stop.load(Ordering::SeqCst) && system.is_empty() {
                    // Mic leftovers can never be paired once capture has
                    // stopped.
                    while mic.pop(Duration::ZERO).is_some() {
                        counters.unpaired_discards.fetch_add(1, Ordering::Relaxed);
                    }
                    break;
                }
                continue;
            }
        };
        // Once stop is signalled no partner can arrive, so don't wait
        // out the timeout for one.
        let partner_wait = if stop.load(Ordering::SeqCst) {
            Duration::ZERO
        } else {
            POP_TIMEOUT
        };
        let mic_block = match mic.pop(partner_wait) {
            Some(block) => block,
            None => {
                counters.unpaired_discards.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        let mixed = mixer::mix(&system_block, &mic_block);
        write_block(&mut sink, &mixed, &counters);
    }
    log::debug!("merged writer exiting: {}", sink.path().display());
    sink
}

fn write_block(sink: &mut SinkWriter, block: &PcmBlock, counters: &WriterCounters) {
    match sink.write(block) {
        Ok(()) => {
            counters.blocks_written.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            counters.write_errors.fetch_add(1, Ordering::Relaxed);
            let mut first = counters.first_write_error.lock();
            if first.is_none() {
                *first = Some(e.to_string());
            }
            log::error!("sink write failed: {}", e);
        }
    }
}

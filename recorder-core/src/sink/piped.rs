use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::models::config::OutputFormat;
use crate::models::error::RecordError;

/// How long to wait for the encoder to exit after its input closes
/// before it is forcibly terminated.
const EXIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Streams raw PCM into an external encoder process.
///
/// The encoder (an ffmpeg-compatible command line) reads signed 16-bit
/// little-endian PCM from stdin and writes the target format itself;
/// this writer only moves bytes. Its stdout and stderr are discarded.
pub struct EncoderPipeWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    output_path: PathBuf,
}

impl EncoderPipeWriter {
    /// Spawn the encoder. Failure to launch is fatal to session startup.
    pub fn spawn(
        encoder: &Path,
        format: OutputFormat,
        output_path: PathBuf,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, RecordError> {
        if !encoder.is_file() {
            return Err(RecordError::EncoderLaunch(format!(
                "encoder not found at {}",
                encoder.display()
            )));
        }
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RecordError::SinkOpen(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let (muxer, codec_args) = encoder_args(format);
        let mut child = Command::new(encoder)
            .arg("-y")
            .args(["-f", "s16le"])
            .args(["-ar", &sample_rate.to_string()])
            .args(["-ac", &channels.to_string()])
            .args(["-i", "-"])
            .args(codec_args)
            .args(["-f", muxer])
            .arg(&output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                RecordError::EncoderLaunch(format!("{}: {}", encoder.display(), e))
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            let _ = child.kill();
            RecordError::EncoderLaunch("encoder stdin unavailable".into())
        })?;

        log::info!(
            "encoder started (pid {}) for {}",
            child.id(),
            output_path.display()
        );
        Ok(Self {
            child,
            stdin: Some(stdin),
            output_path,
        })
    }

    /// Forward PCM bytes to the encoder's stdin.
    pub fn write(&mut self, data: &[u8]) -> Result<(), RecordError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RecordError::Storage("encoder input is closed".into()))?;
        stdin
            .write_all(data)
            .map_err(|e| RecordError::Storage(format!("encoder pipe write failed: {}", e)))
    }

    /// Close stdin to signal end-of-stream, then wait for the encoder to
    /// finish. A non-zero exit is logged, not raised — whatever file the
    /// encoder produced is still reported.
    pub fn close(mut self) -> Result<(), RecordError> {
        drop(self.stdin.take());

        match self.wait_with_timeout(EXIT_TIMEOUT) {
            Some(status) if status.success() => {
                log::info!("encoder finished: {}", self.output_path.display());
            }
            Some(status) => {
                log::warn!(
                    "encoder exited with {} for {}",
                    status,
                    self.output_path.display()
                );
            }
            None => {
                log::warn!(
                    "encoder did not exit within {:?}, killing it",
                    EXIT_TIMEOUT
                );
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }
        Ok(())
    }

    /// Kill the encoder and remove its target file. Used when session
    /// startup fails after this sink was opened.
    pub fn abort(mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        if self.output_path.exists() {
            if let Err(e) = fs::remove_file(&self.output_path) {
                log::warn!(
                    "failed to remove partial file {}: {}",
                    self.output_path.display(),
                    e
                );
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.output_path
    }

    /// Poll for exit until `timeout` elapses. `std` offers no blocking
    /// wait with a deadline, so this spins on `try_wait`.
    fn wait_with_timeout(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return None;
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    log::warn!("waiting on encoder failed: {}", e);
                    return None;
                }
            }
        }
    }
}

/// Muxer name and codec arguments per output format.
fn encoder_args(format: OutputFormat) -> (&'static str, &'static [&'static str]) {
    match format {
        OutputFormat::Mp3 => ("mp3", &["-c:a", "libmp3lame", "-b:a", "192k"]),
        OutputFormat::Flac => ("flac", &["-c:a", "flac"]),
        OutputFormat::M4a => ("ipod", &["-c:a", "aac", "-b:a", "192k"]),
        OutputFormat::Wav => ("wav", &[]),
    }
}

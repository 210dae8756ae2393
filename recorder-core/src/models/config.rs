use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::RecordError;

/// Which sources are captured and how they are routed to output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingMode {
    MicrophoneOnly,
    SystemOnly,
    /// System and microphone mixed into one output stream.
    SystemAndMicMerged,
    /// System and microphone written to two independent output files.
    SystemAndMicSeparate,
}

impl RecordingMode {
    pub fn needs_microphone(&self) -> bool {
        matches!(
            self,
            Self::MicrophoneOnly | Self::SystemAndMicMerged | Self::SystemAndMicSeparate
        )
    }

    pub fn needs_system(&self) -> bool {
        matches!(
            self,
            Self::SystemOnly | Self::SystemAndMicMerged | Self::SystemAndMicSeparate
        )
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, Self::SystemAndMicMerged)
    }

    /// Number of output files this mode produces.
    pub fn sink_count(&self) -> usize {
        match self {
            Self::SystemAndMicSeparate => 2,
            _ => 1,
        }
    }
}

/// Target output format. Uncompressed WAV is written directly; the other
/// formats are produced by the external encoder process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Mp3,
    M4a,
    Flac,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Flac => "flac",
        }
    }

    /// Whether producing this format requires the external encoder.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, Self::Wav)
    }
}

/// Largest accepted digital gain level.
pub const MAX_GAIN_LEVEL: u8 = 10;

/// Configuration for one recording session. Constructed once per session,
/// immutable thereafter.
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    pub format: OutputFormat,

    /// Directory recording files are written into (created if missing).
    pub output_directory: PathBuf,

    pub mode: RecordingMode,

    /// Digital gain for the system stream, 0 (off) to 10.
    pub system_gain: u8,

    /// Digital gain for the microphone stream, 0 (off) to 10.
    pub microphone_gain: u8,

    /// Path to the external encoder executable (ffmpeg-compatible
    /// command line). Required for compressed formats.
    pub encoder_path: PathBuf,

    /// Frames per captured block.
    pub block_frames: usize,

    /// Per-stream queue capacity in blocks. Overflow drops the newest
    /// block and counts it.
    pub queue_capacity: usize,
}

impl RecordingConfig {
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.system_gain > MAX_GAIN_LEVEL {
            return Err(RecordError::InvalidConfig(format!(
                "system gain {} exceeds maximum {}",
                self.system_gain, MAX_GAIN_LEVEL
            )));
        }
        if self.microphone_gain > MAX_GAIN_LEVEL {
            return Err(RecordError::InvalidConfig(format!(
                "microphone gain {} exceeds maximum {}",
                self.microphone_gain, MAX_GAIN_LEVEL
            )));
        }
        if self.block_frames == 0 {
            return Err(RecordError::InvalidConfig("block_frames must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(RecordError::InvalidConfig("queue_capacity must be positive".into()));
        }
        if self.format.is_compressed() && self.encoder_path.as_os_str().is_empty() {
            return Err(RecordError::InvalidConfig(format!(
                "{} output requires an encoder path",
                self.format.extension()
            )));
        }
        Ok(())
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Wav,
            output_directory: PathBuf::from("."),
            mode: RecordingMode::SystemAndMicMerged,
            system_gain: 0,
            microphone_gain: 0,
            encoder_path: PathBuf::new(),
            block_frames: 1024,
            queue_capacity: crate::block_queue::DEFAULT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RecordingConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_gain() {
        let config = RecordingConfig {
            system_gain: 11,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RecordError::InvalidConfig(_))));

        let config = RecordingConfig {
            microphone_gain: 200,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn compressed_format_requires_encoder() {
        let config = RecordingConfig {
            format: OutputFormat::Mp3,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecordingConfig {
            format: OutputFormat::Mp3,
            encoder_path: PathBuf::from("/usr/bin/ffmpeg"),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn wav_needs_no_encoder() {
        let config = RecordingConfig {
            format: OutputFormat::Wav,
            encoder_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mode_wiring() {
        assert!(RecordingMode::MicrophoneOnly.needs_microphone());
        assert!(!RecordingMode::MicrophoneOnly.needs_system());
        assert!(!RecordingMode::SystemOnly.needs_microphone());
        assert!(RecordingMode::SystemAndMicMerged.is_merged());
        assert_eq!(RecordingMode::SystemAndMicSeparate.sink_count(), 2);
        assert_eq!(RecordingMode::SystemAndMicMerged.sink_count(), 1);
    }
}

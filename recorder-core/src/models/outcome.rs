use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{OutputFormat, RecordingMode};

/// Which captured signal a finalized file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Merged system + microphone, or the sole source in a single-source
    /// mode recorded to an untagged file.
    Mixed,
    System,
    Microphone,
}

/// One finalized output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedTrack {
    pub kind: TrackKind,
    pub path: PathBuf,
    /// Hex SHA-256 of the file, `None` when the encoder produced nothing.
    pub checksum: Option<String>,
}

/// Degradation counters accumulated by the capture callbacks and writer
/// threads. Non-zero values mean audio was lost or a sink misbehaved;
/// the recording itself still completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Blocks successfully handed to a sink.
    pub blocks_written: u64,
    /// Blocks dropped because a queue was full.
    pub overflow_drops: u64,
    /// Merged-mode blocks discarded because the partner queue had
    /// nothing to pair them with.
    pub unpaired_discards: u64,
    /// Sink write calls that failed.
    pub write_errors: u64,
    /// Message of the first failed write, if any.
    pub first_write_error: Option<String>,
}

/// Serializable description of a finished recording, written as a JSON
/// sidecar next to the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub mode: RecordingMode,
    pub format: OutputFormat,
    pub duration_secs: f64,
    pub tracks: Vec<RecordedTrack>,
}

impl RecordingMetadata {
    pub fn new(
        mode: RecordingMode,
        format: OutputFormat,
        duration_secs: f64,
        tracks: Vec<RecordedTrack>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            mode,
            format,
            duration_secs,
            tracks,
        }
    }
}

/// Everything `stop()` hands back: the finalized files, how long audio
/// was actually flowing (paused time excluded), and the degradation
/// counters.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOutcome {
    pub tracks: Vec<RecordedTrack>,
    pub duration_secs: f64,
    pub stats: SessionStats,
    pub metadata: RecordingMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes_round_trip() {
        let metadata = RecordingMetadata::new(
            RecordingMode::SystemAndMicSeparate,
            OutputFormat::Flac,
            12.5,
            vec![RecordedTrack {
                kind: TrackKind::System,
                path: PathBuf::from("/tmp/recording_system.flac"),
                checksum: Some("abc123".into()),
            }],
        );

        let json = serde_json::to_string(&metadata).unwrap();
        let back: RecordingMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
        assert!(json.contains("system-and-mic-separate"));
        assert!(json.contains("flac"));
    }

    #[test]
    fn fresh_stats_are_clean() {
        let stats = SessionStats::default();
        assert_eq!(stats.overflow_drops, 0);
        assert_eq!(stats.write_errors, 0);
        assert!(stats.first_write_error.is_none());
    }
}

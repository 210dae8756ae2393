use std::fs;
use std::path::Path;

use crate::models::error::RecordError;
use crate::models::outcome::RecordingMetadata;

/// Write recording metadata as a JSON sidecar file.
///
/// Creates `{recording}.metadata.json` alongside the recording.
pub fn write_sidecar(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), RecordError> {
    let sidecar_path = recording_path.with_extension("metadata.json");
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RecordError::Storage(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&sidecar_path, json)
        .map_err(|e| RecordError::Storage(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata back from its JSON sidecar.
pub fn read_sidecar(recording_path: &Path) -> Result<RecordingMetadata, RecordError> {
    let sidecar_path = recording_path.with_extension("metadata.json");
    let json = fs::read_to_string(&sidecar_path)
        .map_err(|e| RecordError::Storage(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| RecordError::Storage(format!("failed to parse metadata: {}", e)))
}

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::error::RecordError;
use crate::processing::wav_format;

/// Streaming writer for the uncompressed RIFF container.
///
/// Writes a header with placeholder sizes on open, appends raw PCM bytes
/// per write, and patches the size fields on close. Owned by exactly one
/// writer thread while recording.
pub struct WavFileWriter {
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
}

impl WavFileWriter {
    /// Create the file (and its parent directory) and write the header.
    pub fn open(path: PathBuf, sample_rate: u32, channels: u16) -> Result<Self, RecordError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RecordError::SinkOpen(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let mut file = File::create(&path)
            .map_err(|e| RecordError::SinkOpen(format!("failed to create {}: {}", path.display(), e)))?;

        let header = wav_format::header(sample_rate, channels, 0);
        file.write_all(&header)
            .map_err(|e| RecordError::SinkOpen(format!("failed to write header: {}", e)))?;

        log::info!("container opened: {}", path.display());
        Ok(Self {
            path,
            file: Some(file),
            bytes_written: header.len() as u64,
        })
    }

    /// Append raw little-endian PCM bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), RecordError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RecordError::Storage("container is closed".into()))?;
        file.write_all(data)
            .map_err(|e| RecordError::Storage(format!("container write failed: {}", e)))?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Patch the header size fields and flush.
    pub fn close(mut self) -> Result<(), RecordError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| RecordError::Storage("container is closed".into()))?;

        let io_err = |e: std::io::Error| RecordError::Storage(e.to_string());

        let riff_size = (self.bytes_written - 8) as u32;
        file.seek(SeekFrom::Start(wav_format::RIFF_SIZE_OFFSET)).map_err(io_err)?;
        file.write_all(&riff_size.to_le_bytes()).map_err(io_err)?;

        let data_size = (self.bytes_written - wav_format::HEADER_LEN as u64) as u32;
        file.seek(SeekFrom::Start(wav_format::DATA_SIZE_OFFSET)).map_err(io_err)?;
        file.write_all(&data_size.to_le_bytes()).map_err(io_err)?;

        file.flush().map_err(io_err)?;
        log::info!(
            "container finalized: {} ({} data bytes)",
            self.path.display(),
            data_size
        );
        Ok(())
    }

    /// Discard without finalizing and remove the partial file. Used when
    /// session startup fails after this sink was opened.
    pub fn abort(mut self) {
        self.file.take();
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to remove partial file {}: {}", self.path.display(), e);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes written so far, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_then_data_and_patches_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");

        let mut writer = WavFileWriter::open(path.clone(), 48_000, 2).unwrap();
        writer.write(&[0u8; 16]).unwrap();
        assert_eq!(writer.bytes_written(), 44 + 16);
        writer.close().unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 44 + 16);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WAVE");

        let riff_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        assert_eq!(riff_size, (44 + 16) - 8);
        let data_size = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
        assert_eq!(data_size, 16);
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/take.wav");

        let writer = WavFileWriter::open(path.clone(), 44_100, 1).unwrap();
        writer.close().unwrap();

        assert!(path.is_file());
    }

    #[test]
    fn abort_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doomed.wav");

        let mut writer = WavFileWriter::open(path.clone(), 48_000, 2).unwrap();
        writer.write(&[1u8; 8]).unwrap();
        writer.abort();

        assert!(!path.exists());
    }

    #[test]
    fn empty_recording_is_still_a_valid_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");

        WavFileWriter::open(path.clone(), 48_000, 2).unwrap().close().unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 44);
        let data_size = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
        assert_eq!(data_size, 0);
    }
}

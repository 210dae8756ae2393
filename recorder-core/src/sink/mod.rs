//! Terminal consumers for captured audio: either a raw RIFF container or
//! an external encoder reached through a byte-stream pipe.

pub mod container;
pub mod metadata;
pub mod piped;

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::block::PcmBlock;
use crate::models::config::{OutputFormat, RecordingConfig};
use crate::models::error::RecordError;

pub use container::WavFileWriter;
pub use piped::EncoderPipeWriter;

/// One recording destination, selected once at session start from the
/// configured output format. Uncompressed output is written directly;
/// everything else streams through the encoder process.
pub enum SinkWriter {
    Container(WavFileWriter),
    Piped(EncoderPipeWriter),
}

impl SinkWriter {
    /// Open the sink appropriate for the configured format.
    pub fn open(
        config: &RecordingConfig,
        path: PathBuf,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, RecordError> {
        match config.format {
            OutputFormat::Wav => Ok(Self::Container(WavFileWriter::open(
                path,
                sample_rate,
                channels,
            )?)),
            _ => Ok(Self::Piped(EncoderPipeWriter::spawn(
                &config.encoder_path,
                config.format,
                path,
                sample_rate,
                channels,
            )?)),
        }
    }

    /// Write one block. Blocks must arrive in capture order; the writer
    /// thread owning this sink is the only caller.
    pub fn write(&mut self, block: &PcmBlock) -> Result<(), RecordError> {
        let bytes = block.to_le_bytes();
        match self {
            Self::Container(writer) => writer.write(&bytes),
            Self::Piped(writer) => writer.write(&bytes),
        }
    }

    /// Finalize the output and return the SHA-256 checksum of whatever
    /// file exists afterwards (`None` when the encoder produced nothing).
    pub fn close(self) -> Result<Option<String>, RecordError> {
        let path = self.path().to_path_buf();
        match self {
            Self::Container(writer) => writer.close()?,
            Self::Piped(writer) => writer.close()?,
        }
        if path.is_file() {
            Ok(Some(sha256_file(&path)?))
        } else {
            log::warn!("no output file at {}", path.display());
            Ok(None)
        }
    }

    /// Tear down without finalizing and remove the partial output file.
    pub fn abort(self) {
        match self {
            Self::Container(writer) => writer.abort(),
            Self::Piped(writer) => writer.abort(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Container(writer) => writer.path(),
            Self::Piped(writer) => writer.path(),
        }
    }
}

/// Hex SHA-256 digest of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String, RecordError> {
    let data = fs::read(path)
        .map_err(|e| RecordError::Storage(format!("failed to read {}: {}", path.display(), e)))?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_config(dir: &Path) -> RecordingConfig {
        RecordingConfig {
            output_directory: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn wav_format_selects_the_container_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let config = wav_config(dir.path());
        let sink =
            SinkWriter::open(&config, dir.path().join("take.wav"), 48_000, 2).unwrap();
        assert!(matches!(sink, SinkWriter::Container(_)));
        sink.abort();
    }

    #[test]
    fn close_reports_a_checksum_for_the_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = wav_config(dir.path());
        let path = dir.path().join("take.wav");

        let mut sink = SinkWriter::open(&config, path.clone(), 48_000, 1).unwrap();
        sink.write(&PcmBlock::new(vec![1, 2, 3], 1, 48_000)).unwrap();
        let checksum = sink.close().unwrap().unwrap();

        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, sha256_file(&path).unwrap());
    }

    #[test]
    fn checksum_is_stable_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bytes.bin");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

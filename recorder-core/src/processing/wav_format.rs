//! Minimal linear-PCM RIFF container layout.
//!
//! The engine records 16-bit interleaved PCM exclusively, so the header
//! is fixed at the classic 44-byte form: RIFF descriptor, `fmt ` chunk
//! with format code 1, `data` chunk.

/// Size of the header in bytes.
pub const HEADER_LEN: usize = 44;

/// Byte offset of the RIFF chunk size field (file size minus 8).
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field.
pub const DATA_SIZE_OFFSET: u64 = 40;

const BITS_PER_SAMPLE: u16 = 16;

/// Build a header for interleaved 16-bit PCM.
///
/// `data_len` may be a placeholder (0); the container writer patches the
/// size fields at [`RIFF_SIZE_OFFSET`] and [`DATA_SIZE_OFFSET`] on close.
pub fn header(sample_rate: u32, channels: u16, data_len: u32) -> [u8; HEADER_LEN] {
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * u32::from(block_align);

    let mut header = [0u8; HEADER_LEN];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM format code
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn chunk_magic() {
        let header = header(48_000, 2, 0);
        assert_eq!(header.len(), HEADER_LEN);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn pcm_format_fields() {
        let header = header(48_000, 2, 0);
        assert_eq!(read_u32(&header, 16), 16); // fmt chunk size
        assert_eq!(read_u16(&header, 20), 1); // PCM
        assert_eq!(read_u16(&header, 34), 16); // bit depth
    }

    #[test]
    fn derived_rate_fields_48k_stereo() {
        let header = header(48_000, 2, 9600);
        assert_eq!(read_u16(&header, 22), 2);
        assert_eq!(read_u32(&header, 24), 48_000);
        assert_eq!(read_u32(&header, 28), 192_000); // 48000 * 2ch * 2B
        assert_eq!(read_u16(&header, 32), 4); // 2ch * 2B
        assert_eq!(read_u32(&header, 40), 9600);
        assert_eq!(read_u32(&header, 4), 36 + 9600);
    }

    #[test]
    fn derived_rate_fields_44k_mono() {
        let header = header(44_100, 1, 0);
        assert_eq!(read_u32(&header, 28), 88_200);
        assert_eq!(read_u16(&header, 32), 2);
    }

    #[test]
    fn size_offsets_point_at_size_fields() {
        let header = header(48_000, 2, 0xAABB);
        assert_eq!(read_u32(&header, RIFF_SIZE_OFFSET as usize), 36 + 0xAABB);
        assert_eq!(read_u32(&header, DATA_SIZE_OFFSET as usize), 0xAABB);
    }
}

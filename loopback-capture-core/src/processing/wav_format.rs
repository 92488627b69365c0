//! RIFF/WAVE header generation, backpatch offsets, and header parsing.
//!
//! Only the canonical 44-byte PCM layout is produced:
//!
//! ```text
//! [0-3]    "RIFF"
//! [4-7]    file size - 8 (36 + data_size)
//! [8-11]   "WAVE"
//! [12-15]  "fmt "
//! [16-19]  16 (PCM format chunk size)
//! [20-21]  1 (PCM format code)
//! [22-23]  channels
//! [24-27]  sample_rate
//! [28-31]  byte_rate = sample_rate * channels * bits_per_sample / 8
//! [32-33]  block_align = channels * bits_per_sample / 8
//! [34-35]  bits_per_sample
//! [36-39]  "data"
//! [40-43]  data_size
//! ```

use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Offset of the RIFF chunk size field (file size - 8).
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the data chunk size field.
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Bytes between the RIFF size field and the first PCM byte.
pub const RIFF_SIZE_BASE: u32 = 36;

const PCM_FORMAT_CODE: u16 = 1;
const PCM_FMT_CHUNK_SIZE: u32 = 16;

/// Generate a 44-byte WAV header for `data_size` bytes of PCM.
///
/// `generate_wav_header(format, 0)` is the placeholder written on open.
pub fn generate_wav_header(format: &AudioFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_chunk_size(data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&PCM_FMT_CHUNK_SIZE.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT_CODE.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Value of the RIFF size field for a given data chunk size.
pub fn riff_chunk_size(data_size: u32) -> u32 {
    RIFF_SIZE_BASE.wrapping_add(data_size)
}

/// Fields read back from a 44-byte PCM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub format: AudioFormat,
    pub riff_size: u32,
    pub data_size: u32,
    pub byte_rate: u32,
    pub block_align: u16,
}

impl WavHeader {
    /// Whether the size fields still hold the open-time placeholders.
    pub fn is_placeholder(&self) -> bool {
        self.data_size == 0 && self.riff_size == RIFF_SIZE_BASE
    }
}

/// Parse the canonical 44-byte PCM header at the start of `bytes`.
///
/// Works on unfinalized files too; the size fields are returned as stored.
pub fn parse_wav_header(bytes: &[u8]) -> Result<WavHeader, CaptureError> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(CaptureError::StorageError(format!(
            "header too short: {} bytes",
            bytes.len()
        )));
    }

    for (offset, id) in [(0, b"RIFF"), (8, b"WAVE"), (12, b"fmt "), (36, b"data")] {
        if &bytes[offset..offset + 4] != id {
            return Err(CaptureError::StorageError(format!(
                "expected {:?} at offset {}",
                String::from_utf8_lossy(id),
                offset
            )));
        }
    }

    let fmt_size = read_u32(bytes, 16);
    let format_code = read_u16(bytes, 20);
    if fmt_size != PCM_FMT_CHUNK_SIZE || format_code != PCM_FORMAT_CODE {
        return Err(CaptureError::StorageError(format!(
            "not a PCM header (fmt size {}, format code {})",
            fmt_size, format_code
        )));
    }

    Ok(WavHeader {
        format: AudioFormat {
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            bits_per_sample: read_u16(bytes, 34),
        },
        riff_size: read_u32(bytes, 4),
        data_size: read_u32(bytes, 40),
        byte_rate: read_u32(bytes, 28),
        block_align: read_u16(bytes, 32),
    })
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_44_bytes() {
        let header = generate_wav_header(&AudioFormat::new(48000, 2, 16), 0);
        assert_eq!(header.len(), 44);
    }

    #[test]
    fn header_riff_magic() {
        let header = generate_wav_header(&AudioFormat::new(48000, 2, 16), 0);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn placeholder_sizes() {
        let header = generate_wav_header(&AudioFormat::new(16000, 1, 16), 0);
        assert_eq!(read_u32(&header, 4), 36);
        assert_eq!(read_u32(&header, 40), 0);
        assert!(parse_wav_header(&header).unwrap().is_placeholder());
    }

    #[test]
    fn header_48khz_stereo_16bit() {
        let header = generate_wav_header(&AudioFormat::new(48000, 2, 16), 9600);

        assert_eq!(read_u16(&header, 20), 1);
        assert_eq!(read_u32(&header, 16), 16);
        assert_eq!(read_u16(&header, 22), 2);
        assert_eq!(read_u32(&header, 24), 48000);
        assert_eq!(read_u32(&header, 28), 192000); // 48000 * 2 * 16/8
        assert_eq!(read_u16(&header, 32), 4); // 2 * 16/8
        assert_eq!(read_u16(&header, 34), 16);
        assert_eq!(read_u32(&header, 40), 9600);
        assert_eq!(read_u32(&header, 4), 36 + 9600);
    }

    #[test]
    fn header_24bit_block_align() {
        let header = generate_wav_header(&AudioFormat::new(44100, 2, 24), 0);
        assert_eq!(read_u16(&header, 32), 6);
        assert_eq!(read_u32(&header, 28), 264600);
    }

    #[test]
    fn parse_round_trips_generated_header() {
        let format = AudioFormat::new(44100, 1, 32);
        let parsed = parse_wav_header(&generate_wav_header(&format, 400)).unwrap();
        assert_eq!(parsed.format, format);
        assert_eq!(parsed.data_size, 400);
        assert_eq!(parsed.riff_size, 436);
        assert_eq!(parsed.block_align, 4);
        assert!(!parsed.is_placeholder());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_wav_header(&[0u8; 10]).is_err());

        let mut header = generate_wav_header(&AudioFormat::new(16000, 1, 16), 0);
        header[8..12].copy_from_slice(b"AVI ");
        assert!(parse_wav_header(&header).is_err());

        let mut header = generate_wav_header(&AudioFormat::new(16000, 1, 16), 0);
        header[20..22].copy_from_slice(&3u16.to_le_bytes()); // IEEE float
        assert!(parse_wav_header(&header).is_err());
    }
}

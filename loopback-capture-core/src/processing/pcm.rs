//! Float to integer PCM conversion.
//!
//! Every sample is clamped to `[-1.0, 1.0]`, scaled by the positive full-scale
//! value of the target depth, and truncated toward zero. NaN encodes as 0.

use crate::models::error::CaptureError;

const SCALE_16: f32 = 32767.0;
const SCALE_24: f32 = 8388607.0;
const SCALE_32: f64 = 2147483647.0;

/// Number of bytes `sample_count` samples occupy at `bits_per_sample`.
pub fn encoded_len(sample_count: usize, bits_per_sample: u16) -> usize {
    sample_count * (bits_per_sample as usize / 8)
}

/// Append the little-endian PCM encoding of `samples` to `out`.
///
/// Fails with `UnsupportedBitDepth` before touching `out` when the depth is
/// not 16, 24, or 32.
pub fn encode_into(samples: &[f32], bits_per_sample: u16, out: &mut Vec<u8>) -> Result<(), CaptureError> {
    match bits_per_sample {
        16 => {
            out.reserve(samples.len() * 2);
            for &sample in samples {
                out.extend_from_slice(&to_i16(sample).to_le_bytes());
            }
        }
        24 => {
            out.reserve(samples.len() * 3);
            for &sample in samples {
                out.extend_from_slice(&to_i24(sample).to_le_bytes()[..3]);
            }
        }
        32 => {
            out.reserve(samples.len() * 4);
            for &sample in samples {
                out.extend_from_slice(&to_i32(sample).to_le_bytes());
            }
        }
        other => return Err(CaptureError::UnsupportedBitDepth(other)),
    }
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * SCALE_16) as i16
}

/// 24-bit value carried in the low three bytes of an i32.
fn to_i24(sample: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) * SCALE_24) as i32
}

// f32 cannot represent 2147483647, so the 32-bit scale is applied in f64.
fn to_i32(sample: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) as f64 * SCALE_32) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[f32], bits_per_sample: u16) -> Result<Vec<u8>, CaptureError> {
        let mut out = Vec::new();
        encode_into(samples, bits_per_sample, &mut out)?;
        Ok(out)
    }

    #[test]
    fn sixteen_bit_full_scale() {
        let bytes = encode(&[1.0, -1.0, 0.0, 0.5], 16).unwrap();
        assert_eq!(
            bytes,
            [
                32767i16.to_le_bytes(),
                (-32767i16).to_le_bytes(),
                0i16.to_le_bytes(),
                16383i16.to_le_bytes(),
            ]
            .concat()
        );
    }

    #[test]
    fn twenty_four_bit_is_three_bytes_per_sample() {
        let bytes = encode(&[1.0, -1.0], 24).unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(&bytes[0..3], &[0xFF, 0xFF, 0x7F]); // 8388607
        assert_eq!(&bytes[3..6], &[0x01, 0x00, 0x80]); // -8388607
    }

    #[test]
    fn thirty_two_bit_full_scale_is_exact() {
        let bytes = encode(&[1.0, -1.0], 32).unwrap();
        assert_eq!(&bytes[0..4], &i32::MAX.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-i32::MAX).to_le_bytes());
    }

    #[test]
    fn out_of_range_samples_clamp() {
        for bits in [16u16, 24, 32] {
            assert_eq!(encode(&[1.5], bits).unwrap(), encode(&[1.0], bits).unwrap(), "{} bit", bits);
            assert_eq!(encode(&[-2.0], bits).unwrap(), encode(&[-1.0], bits).unwrap(), "{} bit", bits);
        }
    }

    #[test]
    fn nan_encodes_as_silence() {
        for bits in [16u16, 24, 32] {
            assert_eq!(encode(&[f32::NAN], bits).unwrap(), encode(&[0.0], bits).unwrap());
        }
    }

    #[test]
    fn truncates_toward_zero() {
        // 0.00002 * 32767 = 0.655 → 0, -0.00002 → 0
        assert_eq!(encode(&[0.00002, -0.00002], 16).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn unsupported_depth_leaves_output_untouched() {
        let mut out = vec![9u8];
        assert_eq!(
            encode_into(&[0.5], 20, &mut out),
            Err(CaptureError::UnsupportedBitDepth(20))
        );
        assert_eq!(out, vec![9u8]);
    }

    #[test]
    fn encoded_len_matches_output() {
        for bits in [16u16, 24, 32] {
            let samples = [0.1f32; 7];
            assert_eq!(encode(&samples, bits).unwrap().len(), encoded_len(7, bits));
        }
    }
}

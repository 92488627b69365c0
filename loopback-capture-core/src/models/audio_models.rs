use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// PCM format negotiated by the native engine.
///
/// Immutable for the lifetime of an initialized session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Frames per second in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// PCM bit depth of the output file. Valid values: 16, 24, 32.
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub const SUPPORTED_BIT_DEPTHS: [u16; 3] = [16, 24, 32];

    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Bytes per interleaved frame (`channels * bits_per_sample / 8`).
    pub fn block_align(&self) -> u16 {
        (self.channels as u32 * self.bits_per_sample as u32 / 8) as u16
    }

    /// Bytes per second (`sample_rate * block_align`).
    pub fn byte_rate(&self) -> u32 {
        (self.sample_rate as u64 * self.channels as u64 * self.bits_per_sample as u64 / 8) as u32
    }

    pub fn is_supported_bit_depth(&self) -> bool {
        Self::SUPPORTED_BIT_DEPTHS.contains(&self.bits_per_sample)
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.sample_rate == 0 {
            return Err(CaptureError::ConfigurationFailed("sample rate must be positive".into()));
        }
        if self.channels == 0 {
            return Err(CaptureError::ConfigurationFailed("channel count must be positive".into()));
        }
        if !self.is_supported_bit_depth() {
            return Err(CaptureError::UnsupportedBitDepth(self.bits_per_sample));
        }
        // Header fields: block align is u16, byte rate is u32.
        let block_align = self.channels as u64 * self.bits_per_sample as u64 / 8;
        if block_align > u16::MAX as u64 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "block align {} exceeds the WAV limit for {} channels",
                block_align, self.channels
            )));
        }
        if self.sample_rate as u64 * block_align > u32::MAX as u64 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "byte rate exceeds the WAV limit at {} Hz",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// Playback length of `data_size` PCM bytes in this format.
    pub fn duration_secs(&self, data_size: u64) -> f64 {
        let byte_rate = self.byte_rate();
        if byte_rate == 0 {
            return 0.0;
        }
        data_size as f64 / byte_rate as f64
    }
}

/// An application currently producing audio, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub pid: u32,
    pub name: String,
}

/// Ingestion and output counters for one capture session.
///
/// `buffers_delivered` counts every non-empty native callback, including the
/// ones that were dropped under backpressure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub buffers_delivered: u64,
    pub buffers_dropped: u64,
    pub buffers_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_fields_16khz_mono() {
        let format = AudioFormat::new(16000, 1, 16);
        assert_eq!(format.bytes_per_sample(), 2);
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.byte_rate(), 32000);
    }

    #[test]
    fn derived_fields_48khz_stereo_24bit() {
        let format = AudioFormat::new(48000, 2, 24);
        assert_eq!(format.block_align(), 6);
        assert_eq!(format.byte_rate(), 288000);
    }

    #[test]
    fn validate_rejects_bad_formats() {
        assert!(AudioFormat::new(48000, 2, 32).validate().is_ok());
        assert_eq!(
            AudioFormat::new(48000, 2, 20).validate(),
            Err(CaptureError::UnsupportedBitDepth(20))
        );
        assert!(matches!(
            AudioFormat::new(0, 2, 16).validate(),
            Err(CaptureError::ConfigurationFailed(_))
        ));
        assert!(matches!(
            AudioFormat::new(48000, 0, 16).validate(),
            Err(CaptureError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn validate_rejects_header_field_overflow() {
        // 16384 ch * 4 bytes = 65536, one past u16
        assert!(matches!(
            AudioFormat::new(48000, 16384, 32).validate(),
            Err(CaptureError::ConfigurationFailed(_))
        ));
        assert!(AudioFormat::new(8000, 16383, 32).validate().is_ok());
        assert!(matches!(
            AudioFormat::new(u32::MAX, 2, 16).validate(),
            Err(CaptureError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn duration_from_data_size() {
        let format = AudioFormat::new(16000, 1, 16);
        approx::assert_relative_eq!(format.duration_secs(32000), 1.0);
        approx::assert_relative_eq!(format.duration_secs(200), 0.00625);
    }
}

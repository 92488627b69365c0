use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;
use crate::processing::{pcm, wav_format};

/// Largest data chunk a RIFF size field can describe.
const MAX_DATA_SIZE: u64 = (u32::MAX - wav_format::RIFF_SIZE_BASE) as u64;

/// Streaming WAV writer with a deferred header backpatch.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header, sizes are placeholders (36, 0) until close]
/// [little-endian integer PCM at format.bits_per_sample...]
/// ```
///
/// A file abandoned before `close` still parses as WAV; only its size fields
/// are wrong. Not internally synchronized: the capture session gives the
/// writer to exactly one consumer thread.
pub struct WavWriter<W: Write + Seek = File> {
    path: Option<PathBuf>,
    format: AudioFormat,
    inner: Option<W>,
    data_size: u64,
    scratch: Vec<u8>,
}

impl WavWriter<File> {
    /// Create `path` (and its parent directories) and write the placeholder header.
    ///
    /// Never opens an existing file: a finished recording is not truncated.
    pub fn create(path: impl Into<PathBuf>, format: AudioFormat) -> Result<Self, CaptureError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    CaptureError::StorageError(format!("{} already exists", path.display()))
                }
                _ => CaptureError::StorageError(format!("failed to create {}: {}", path.display(), e)),
            })?;

        let mut writer = Self::new(file, format)?;
        log::debug!(
            "Opened WAV file {} ({} Hz, {} ch, {} bit)",
            path.display(),
            format.sample_rate,
            format.channels,
            format.bits_per_sample
        );
        writer.path = Some(path);
        Ok(writer)
    }
}

impl<W: Write + Seek> WavWriter<W> {
    /// Wrap an arbitrary seekable sink and write the placeholder header to it.
    pub fn new(mut inner: W, format: AudioFormat) -> Result<Self, CaptureError> {
        let header = wav_format::generate_wav_header(&format, 0);
        inner.write_all(&header).map_err(|e| CaptureError::IoWriteFailed {
            operation: "open",
            reason: e.to_string(),
        })?;

        Ok(Self {
            path: None,
            format,
            inner: Some(inner),
            data_size: 0,
            scratch: Vec::new(),
        })
    }

    /// Encode `samples` at the configured bit depth and append them.
    ///
    /// Returns the number of PCM bytes written. On failure `data_size` still
    /// accounts for any bytes the sink accepted before the error.
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<usize, CaptureError> {
        if self.inner.is_none() {
            return Err(CaptureError::WriterClosed);
        }
        if !self.format.is_supported_bit_depth() {
            return Err(CaptureError::UnsupportedBitDepth(self.format.bits_per_sample));
        }
        let channels = self.format.channels;
        if channels == 0 || samples.len() % channels as usize != 0 {
            return Err(CaptureError::MisalignedBuffer {
                samples: samples.len(),
                channels,
            });
        }
        if samples.is_empty() {
            return Ok(0);
        }

        let needed = pcm::encoded_len(samples.len(), self.format.bits_per_sample) as u64;
        if self.data_size + needed > MAX_DATA_SIZE {
            return Err(CaptureError::StorageError(format!(
                "data chunk would exceed the RIFF limit ({} + {} bytes)",
                self.data_size, needed
            )));
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        pcm::encode_into(samples, self.format.bits_per_sample, &mut scratch)?;
        let result = self.write_pcm(&scratch);
        self.scratch = scratch;
        result
    }

    /// Backpatch the size fields and release the sink.
    ///
    /// Calling `close` on a closed writer is a no-op. The sink is released even
    /// when the backpatch fails.
    pub fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };
        let result = backpatch(&mut inner, self.data_size as u32);
        drop(inner);

        log::debug!(
            "Closed WAV output {}: {} data bytes ({:.2}s)",
            self.display_path(),
            self.data_size,
            self.duration_secs()
        );
        result
    }

    /// Backpatch and hand the sink back instead of dropping it.
    pub fn finish(mut self) -> Result<W, CaptureError> {
        let mut inner = self.inner.take().ok_or(CaptureError::WriterClosed)?;
        backpatch(&mut inner, self.data_size as u32)?;
        Ok(inner)
    }

    /// PCM bytes physically written so far (excludes the header).
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Whole frames written so far.
    pub fn frames_written(&self) -> u64 {
        match self.format.block_align() {
            0 => 0,
            align => self.data_size / align as u64,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.duration_secs(self.data_size)
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Output path, when the writer was created from one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn write_pcm(&mut self, bytes: &[u8]) -> Result<usize, CaptureError> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(CaptureError::WriterClosed);
        };

        let mut written = 0;
        let outcome = loop {
            if written == bytes.len() {
                break Ok(written);
            }
            match inner.write(&bytes[written..]) {
                Ok(0) => {
                    break Err(CaptureError::IoWriteFailed {
                        operation: "write_samples",
                        reason: format!("short write: {} of {} bytes", written, bytes.len()),
                    })
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    break Err(CaptureError::IoWriteFailed {
                        operation: "write_samples",
                        reason: e.to_string(),
                    })
                }
            }
        };
        self.data_size += written as u64;
        outcome
    }

    fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stream>".into())
    }
}

impl<W: Write + Seek> Drop for WavWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Failed to finalize WAV output {}: {}", self.display_path(), e);
        }
    }
}

fn backpatch<W: Write + Seek>(inner: &mut W, data_size: u32) -> Result<(), CaptureError> {
    patch_field(inner, wav_format::DATA_SIZE_OFFSET, data_size)?;
    patch_field(
        inner,
        wav_format::RIFF_SIZE_OFFSET,
        wav_format::riff_chunk_size(data_size),
    )?;
    inner.flush().map_err(|e| CaptureError::IoWriteFailed {
        operation: "close",
        reason: e.to_string(),
    })
}

fn patch_field<W: Write + Seek>(inner: &mut W, offset: u64, value: u32) -> Result<(), CaptureError> {
    inner
        .seek(SeekFrom::Start(offset))
        .map_err(|e| CaptureError::IoSeekFailed {
            offset,
            reason: e.to_string(),
        })?;
    inner
        .write_all(&value.to_le_bytes())
        .map_err(|e| CaptureError::IoWriteFailed {
            operation: "close",
            reason: e.to_string(),
        })
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::{AudioFormat, CaptureStats};

/// Result returned when a capture run is stopped and its file finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub format: AudioFormat,
    /// PCM bytes in the data chunk.
    pub data_size: u64,
    pub frames_written: u64,
    pub duration_secs: f64,
    pub stats: CaptureStats,
    /// SHA-256 hex digest of the finalized file.
    pub checksum: String,
}

/// Metadata stored alongside a recording as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub format: AudioFormat,
    pub duration_secs: f64,
    pub data_size: u64,
    pub buffers_dropped: u64,
    pub checksum: String,
}

impl RecordingMetadata {
    pub fn from_result(result: &RecordingResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: result.file_path.to_string_lossy().into_owned(),
            format: result.format,
            duration_secs: result.duration_secs,
            data_size: result.data_size,
            buffers_dropped: result.stats.buffers_dropped,
            checksum: result.checksum.clone(),
        }
    }
}

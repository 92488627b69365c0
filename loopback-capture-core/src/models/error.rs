use thiserror::Error;

use super::state::CaptureState;

/// Errors that can occur during capture, ingestion, and WAV output.
///
/// Payloads are plain strings and integers so the error stays `Clone` and can
/// be handed to a delegate while also being returned to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("audio format query failed: {0}")]
    FormatQueryFailed(String),

    #[error("{operation}: session is not initialized")]
    NotInitialized { operation: &'static str },

    #[error("{operation}: session is closed")]
    SessionClosed { operation: &'static str },

    #[error("{operation}: not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: CaptureState,
    },

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("capture start failed: {0}")]
    CaptureStartFailed(String),

    #[error("write_samples: writer is closed")]
    WriterClosed,

    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("write_samples: {samples} samples is not a whole number of {channels}-channel frames")]
    MisalignedBuffer { samples: usize, channels: u16 },

    #[error("{operation}: write failed: {reason}")]
    IoWriteFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("seek to offset {offset} failed: {reason}")]
    IoSeekFailed { offset: u64, reason: String },

    #[error("failed to start capturing process {0}")]
    ProcessCaptureFailed(u32),

    #[error("storage error: {0}")]
    StorageError(String),
}

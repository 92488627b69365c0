use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;

/// Event delegate for capture session notifications.
///
/// Called from the thread driving the session or from the writer thread,
/// never from the native audio thread. Implementations should marshal to a
/// UI thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: CaptureState);

    /// Called when a write fails on the writer thread or finalization fails.
    /// The session keeps running.
    fn on_error(&self, error: &CaptureError);

    /// Called when a capture run is stopped and its file finalized.
    fn on_capture_finished(&self, result: &RecordingResult);
}

use std::sync::Arc;

use crate::bridge::registry::CallbackToken;
use crate::models::audio_models::{ApplicationInfo, AudioFormat};
use crate::models::error::CaptureError;

/// Callback the engine invokes for every native delivery.
///
/// The Rust form of a C `(fn, user_data)` pair: the engine passes back the
/// token it was given in `set_callback`, plus the delivered samples (`None`
/// for a null native buffer). Called on the engine's own audio thread.
pub type SampleSink = Arc<dyn Fn(CallbackToken, Option<&[f32]>) + Send + Sync + 'static>;

/// Native capture engine (WASAPI, PulseAudio, ...).
///
/// The engine owns device access, process enumeration and format negotiation.
/// `CaptureSession` drives it through this interface and never assumes
/// anything about its threads beyond the `SampleSink` contract.
pub trait CaptureEngine: Send {
    /// Create the native handle and initialize it.
    ///
    /// Fails with `EngineUnavailable` when no handle can be obtained.
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Format the engine will deliver. Only valid after `open`.
    fn format(&self) -> Result<AudioFormat, CaptureError>;

    /// Register the delivery callback, replacing any previous one.
    ///
    /// A delivery already in flight may still reach the replaced sink; the
    /// engine keeps it callable until the next `stop` returns.
    fn set_callback(&mut self, sink: SampleSink, token: CallbackToken);

    /// Unregister the delivery callback. No new delivery starts after the
    /// return; one in flight may finish until the next `stop` returns.
    fn clear_callback(&mut self);

    /// Start system-wide loopback capture.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Start loopback capture of a single process.
    fn start_process(&mut self, pid: u32) -> Result<(), CaptureError>;

    /// Stop capturing. No deliveries follow the return.
    fn stop(&mut self);

    /// Applications currently producing audio.
    fn list_applications(&self) -> Result<Vec<ApplicationInfo>, CaptureError>;

    /// Release the native handle. Called at most once per successful `open`.
    fn destroy(&mut self);
}

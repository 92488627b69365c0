//! # loopback-capture-core
//!
//! Platform-agnostic loopback capture core.
//!
//! Receives float sample buffers from a native capture engine on the
//! engine's own thread, hands them across a bounded queue to a writer
//! thread, and streams them to a PCM WAV file. Native backends implement
//! the `CaptureEngine` trait and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! loopback-capture-core (this crate)
//! ├── bridge/       ← CallbackBridge, CallbackRegistry, CallbackToken
//! ├── traits/       ← CaptureEngine, CaptureDelegate
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, AudioFormat, etc.
//! ├── processing/   ← PCM conversion, WAV header generation
//! ├── session/      ← CaptureSession (generic orchestrator)
//! └── storage/      ← WavWriter, metadata sidecar
//! ```

pub mod bridge;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use bridge::callback_bridge::{AudioCallback, CallbackBridge, Delivery};
pub use bridge::registry::{CallbackRegistry, CallbackToken};
pub use models::audio_models::{ApplicationInfo, AudioFormat, CaptureStats};
pub use models::config::{CaptureConfiguration, DEFAULT_QUEUE_CAPACITY};
pub use models::error::CaptureError;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::sample_buffer::SampleBuffer;
pub use models::state::CaptureState;
pub use session::capture_session::CaptureSession;
pub use storage::wav_writer::WavWriter;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_engine::{CaptureEngine, SampleSink};

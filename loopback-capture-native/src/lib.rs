//! # loopback-capture-native
//!
//! C-ABI adapter for native loopback engines (WASAPI on Windows,
//! PulseAudio on Linux).
//!
//! Provides:
//! - `NativeEngineApi`: function table of the engine library's C surface
//! - `NativeEngine`: `CaptureEngine` implementation over that table
//! - `deliver_trampoline`: the `extern "C"` callback handed to the engine
//!
//! ## Usage
//! ```ignore
//! use loopback_capture_core::{CaptureConfiguration, CaptureSession};
//! use loopback_capture_native::{NativeEngine, NativeEngineApi};
//!
//! let api: NativeEngineApi = load_wasapi_capture()?;
//! let mut session = CaptureSession::new(NativeEngine::new(api), CaptureConfiguration::default());
//! session.initialize()?;
//! session.start()?;
//! ```

pub mod ffi;
pub mod native_engine;

pub use ffi::{NativeAppInfo, NativeDeliverFn, NativeEngineApi, NativeFormat};
pub use native_engine::{deliver_trampoline, NativeEngine};

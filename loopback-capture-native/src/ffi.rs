//! C surface of the native capture engine.
//!
//! Mirrors `wasapi_capture.h` (and its PulseAudio twin): an opaque handle,
//! integer status codes where non-zero means success, and a
//! `(fn, user_data)` delivery callback invoked on the engine's audio thread.

use std::os::raw::{c_int, c_uint, c_void};

/// Opaque engine handle returned by `create`.
pub type NativeHandle = *mut c_void;

/// `typedef void (*audio_callback)(void* user_data, float* buffer, int frames);`
///
/// `frames` counts f32 values in `buffer`, interleaved across channels.
pub type NativeDeliverFn = unsafe extern "C" fn(user_data: *mut c_void, buffer: *const f32, frames: c_int);

/// Upper bound on applications read per `get_applications` call.
pub const MAX_APPLICATIONS: usize = 32;

/// Capacity of `NativeAppInfo::name`, in UTF-16 code units.
pub const APP_NAME_LEN: usize = 260;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeFormat {
    pub sample_rate: c_uint,
    pub channels: c_uint,
    pub bits_per_sample: c_uint,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct NativeAppInfo {
    pub pid: c_uint,
    /// NUL-terminated UTF-16 executable name.
    pub name: [u16; APP_NAME_LEN],
}

impl NativeAppInfo {
    pub const EMPTY: Self = Self {
        pid: 0,
        name: [0; APP_NAME_LEN],
    };

    /// Decoded name up to the first NUL, or None when the name is empty.
    pub fn name(&self) -> Option<String> {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(APP_NAME_LEN);
        if len == 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&self.name[..len]))
    }
}

/// Function table of a loaded engine library.
///
/// Every pointer must stay callable for as long as any `NativeEngine` built
/// from the table is alive.
#[derive(Clone, Copy)]
pub struct NativeEngineApi {
    pub create: unsafe extern "C" fn() -> NativeHandle,
    pub destroy: unsafe extern "C" fn(handle: NativeHandle),
    pub initialize: unsafe extern "C" fn(handle: NativeHandle) -> c_int,
    pub start: unsafe extern "C" fn(handle: NativeHandle) -> c_int,
    pub stop: unsafe extern "C" fn(handle: NativeHandle),
    pub get_format: unsafe extern "C" fn(handle: NativeHandle, format: *mut NativeFormat) -> c_int,
    pub set_callback:
        unsafe extern "C" fn(handle: NativeHandle, callback: Option<NativeDeliverFn>, user_data: *mut c_void),
    pub get_applications:
        unsafe extern "C" fn(handle: NativeHandle, apps: *mut NativeAppInfo, max_count: c_int) -> c_int,
    pub start_process: unsafe extern "C" fn(handle: NativeHandle, pid: c_uint) -> c_int,
}

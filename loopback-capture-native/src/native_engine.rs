//! `CaptureEngine` over a native engine's C function table.
//!
//! The engine calls back on its own audio thread with `(user_data, buffer,
//! frames)`. `user_data` points at a boxed `DeliveryContext` owned by the
//! `NativeEngine`; the context holds the session's token and sink, so the
//! native side never sees a Rust object beyond that one stable address.
//!
//! The C side swaps its stored `user_data` without synchronizing with a
//! delivery already in flight, so a replaced context stays allocated until
//! the next `stop` (after which no delivery can still be reading it).

use std::os::raw::{c_int, c_uint, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use loopback_capture_core::bridge::callback_bridge::samples_from_raw;
use loopback_capture_core::bridge::registry::CallbackToken;
use loopback_capture_core::models::audio_models::{ApplicationInfo, AudioFormat};
use loopback_capture_core::models::error::CaptureError;
use loopback_capture_core::traits::capture_engine::{CaptureEngine, SampleSink};

use crate::ffi::{NativeAppInfo, NativeEngineApi, NativeFormat, NativeHandle, MAX_APPLICATIONS};

/// What the native callback's `user_data` points at.
struct DeliveryContext {
    token: CallbackToken,
    sink: SampleSink,
}

/// Callback handed to the native engine.
///
/// # Safety
///
/// `user_data` must be null or the pointer registered by
/// `NativeEngine::set_callback`, still alive. `buffer`/`frames` follow the
/// contract of `samples_from_raw`.
pub unsafe extern "C" fn deliver_trampoline(user_data: *mut c_void, buffer: *const f32, frames: c_int) {
    if user_data.is_null() {
        return;
    }
    let context = &*(user_data as *const DeliveryContext);
    let samples = samples_from_raw(buffer, frames);

    // Unwinding into the engine's C frames would abort the process.
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| (context.sink)(context.token, samples)));
    if delivered.is_err() {
        log::error!("Audio callback panicked; buffer discarded");
    }
}

/// A native capture engine driven through its C function table.
pub struct NativeEngine {
    api: NativeEngineApi,
    handle: NativeHandle,
    context: Option<Box<DeliveryContext>>,
    /// Contexts unregistered since the last `stop`.
    retired: Vec<Box<DeliveryContext>>,
}

// SAFETY: the handle is only used from the thread owning the engine; the
// delivery context is Send + Sync (token is Copy, sink is Send + Sync).
unsafe impl Send for NativeEngine {}

impl NativeEngine {
    pub fn new(api: NativeEngineApi) -> Self {
        Self {
            api,
            handle: ptr::null_mut(),
            context: None,
            retired: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.handle.is_null()
    }

    fn require_handle(&self, operation: &'static str) -> Result<NativeHandle, CaptureError> {
        if self.handle.is_null() {
            return Err(CaptureError::NotInitialized { operation });
        }
        Ok(self.handle)
    }

    fn unregister_callback(&mut self) {
        if !self.handle.is_null() {
            unsafe { (self.api.set_callback)(self.handle, None, ptr::null_mut()) };
        }
        self.retired.extend(self.context.take());
    }
}

impl CaptureEngine for NativeEngine {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.is_open() {
            return Ok(());
        }

        let handle = unsafe { (self.api.create)() };
        if handle.is_null() {
            return Err(CaptureError::EngineUnavailable("native create returned null".into()));
        }
        if unsafe { (self.api.initialize)(handle) } == 0 {
            unsafe { (self.api.destroy)(handle) };
            return Err(CaptureError::EngineUnavailable("native initialize failed".into()));
        }

        log::debug!("Native capture engine opened");
        self.handle = handle;
        Ok(())
    }

    fn format(&self) -> Result<AudioFormat, CaptureError> {
        let handle = self.require_handle("format")?;
        let mut raw = NativeFormat::default();
        if unsafe { (self.api.get_format)(handle, &mut raw) } == 0 {
            return Err(CaptureError::FormatQueryFailed("native get_format failed".into()));
        }

        let channels = u16::try_from(raw.channels)
            .map_err(|_| CaptureError::FormatQueryFailed(format!("channel count {} out of range", raw.channels)))?;
        let bits_per_sample = u16::try_from(raw.bits_per_sample)
            .map_err(|_| CaptureError::FormatQueryFailed(format!("bit depth {} out of range", raw.bits_per_sample)))?;
        Ok(AudioFormat::new(raw.sample_rate, channels, bits_per_sample))
    }

    fn set_callback(&mut self, sink: SampleSink, token: CallbackToken) {
        if self.handle.is_null() {
            log::warn!("set_callback on a closed native engine ignored");
            return;
        }

        let context = Box::new(DeliveryContext { token, sink });
        let user_data = &*context as *const DeliveryContext as *mut c_void;
        unsafe { (self.api.set_callback)(self.handle, Some(deliver_trampoline), user_data) };

        self.retired.extend(self.context.replace(context));
    }

    fn clear_callback(&mut self) {
        self.unregister_callback();
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let handle = self.require_handle("start")?;
        if unsafe { (self.api.start)(handle) } == 0 {
            return Err(CaptureError::CaptureStartFailed("native start failed".into()));
        }
        Ok(())
    }

    fn start_process(&mut self, pid: u32) -> Result<(), CaptureError> {
        let handle = self.require_handle("start_capturing_process")?;
        if unsafe { (self.api.start_process)(handle, pid as c_uint) } == 0 {
            return Err(CaptureError::CaptureStartFailed(format!(
                "native start_process failed for pid {}",
                pid
            )));
        }
        Ok(())
    }

    fn stop(&mut self) {
        if !self.handle.is_null() {
            unsafe { (self.api.stop)(self.handle) };
        }
        self.retired.clear();
    }

    fn list_applications(&self) -> Result<Vec<ApplicationInfo>, CaptureError> {
        let handle = self.require_handle("list_applications")?;
        let mut apps = [NativeAppInfo::EMPTY; MAX_APPLICATIONS];
        let count = unsafe { (self.api.get_applications)(handle, apps.as_mut_ptr(), MAX_APPLICATIONS as c_int) };
        let count = count.clamp(0, MAX_APPLICATIONS as c_int) as usize;

        Ok(apps[..count]
            .iter()
            .filter_map(|app| app.name().map(|name| ApplicationInfo { pid: app.pid, name }))
            .collect())
    }

    fn destroy(&mut self) {
        if self.handle.is_null() {
            return;
        }
        unsafe { (self.api.stop)(self.handle) };
        self.unregister_callback();
        unsafe { (self.api.destroy)(self.handle) };
        self.handle = ptr::null_mut();
        self.retired.clear();
        log::debug!("Native capture engine destroyed");
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

//! In-process `CaptureEngine` double that delivers buffers on demand.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::bridge::registry::CallbackToken;
use crate::models::audio_models::{ApplicationInfo, AudioFormat};
use crate::models::error::CaptureError;
use crate::traits::capture_engine::{CaptureEngine, SampleSink};

#[derive(Default)]
pub struct Script {
    pub format: Option<AudioFormat>,
    pub fail_open: bool,
    pub fail_start: bool,
    pub refused_pids: Vec<u32>,
    pub applications: Vec<ApplicationInfo>,
    pub opened: bool,
    pub running: bool,
    pub capturing_pid: Option<u32>,
    pub open_calls: u32,
    pub destroy_calls: u32,
    pub stop_calls: u32,
    sink: Option<(SampleSink, CallbackToken)>,
}

/// Test handle that shares state with the engine given to the session.
#[derive(Clone)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                format: Some(format),
                ..Default::default()
            })),
        }
    }

    pub fn script(&self) -> parking_lot::MutexGuard<'_, Script> {
        self.script.lock()
    }

    /// Deliver one buffer as the native thread would.
    pub fn deliver(&self, samples: &[f32]) {
        self.deliver_raw(Some(samples));
    }

    pub fn deliver_raw(&self, samples: Option<&[f32]>) {
        let registered = self.script.lock().sink.clone();
        if let Some((sink, token)) = registered {
            sink(token, samples);
        }
    }

    pub fn has_callback(&self) -> bool {
        self.script.lock().sink.is_some()
    }
}

impl CaptureEngine for ScriptedEngine {
    fn open(&mut self) -> Result<(), CaptureError> {
        let mut script = self.script.lock();
        script.open_calls += 1;
        if script.fail_open {
            return Err(CaptureError::EngineUnavailable("scripted open failure".into()));
        }
        script.opened = true;
        Ok(())
    }

    fn format(&self) -> Result<AudioFormat, CaptureError> {
        self.script
            .lock()
            .format
            .ok_or_else(|| CaptureError::FormatQueryFailed("scripted format failure".into()))
    }

    fn set_callback(&mut self, sink: SampleSink, token: CallbackToken) {
        self.script.lock().sink = Some((sink, token));
    }

    fn clear_callback(&mut self) {
        self.script.lock().sink = None;
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let mut script = self.script.lock();
        if script.fail_start {
            return Err(CaptureError::CaptureStartFailed("scripted start failure".into()));
        }
        script.running = true;
        Ok(())
    }

    fn start_process(&mut self, pid: u32) -> Result<(), CaptureError> {
        let mut script = self.script.lock();
        if script.refused_pids.contains(&pid) {
            return Err(CaptureError::CaptureStartFailed(format!("pid {} refused", pid)));
        }
        script.running = true;
        script.capturing_pid = Some(pid);
        Ok(())
    }

    fn stop(&mut self) {
        let mut script = self.script.lock();
        script.stop_calls += 1;
        script.running = false;
        script.capturing_pid = None;
    }

    fn list_applications(&self) -> Result<Vec<ApplicationInfo>, CaptureError> {
        Ok(self.script.lock().applications.clone())
    }

    fn destroy(&mut self) {
        let mut script = self.script.lock();
        script.destroy_calls += 1;
        script.opened = false;
    }
}

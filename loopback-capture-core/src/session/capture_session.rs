use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;

use crate::bridge::callback_bridge::{AudioCallback, CallbackBridge};
use crate::bridge::registry::{CallbackRegistry, CallbackToken};
use crate::models::audio_models::{AudioFormat, CaptureStats};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::sample_buffer::SampleBuffer;
use crate::models::state::CaptureState;
use crate::storage::metadata;
use crate::storage::wav_writer::WavWriter;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_engine::{CaptureEngine, SampleSink};

/// Counters updated by the writer thread.
#[derive(Default)]
struct WriterCounters {
    buffers_written: AtomicU64,
    bytes_written: AtomicU64,
    write_errors: AtomicU64,
}

/// What the writer thread reports when it exits.
struct WriterOutcome {
    close_result: Result<(), CaptureError>,
    data_size: u64,
    frames_written: u64,
    duration_secs: f64,
    abandoned: usize,
}

/// One start → stop cycle: the output file and the thread writing it.
struct CaptureRun {
    path: PathBuf,
    abort: Arc<AtomicBool>,
    handle: thread::JoinHandle<WriterOutcome>,
}

impl CaptureRun {
    fn join(self) -> Result<WriterOutcome, CaptureError> {
        self.handle
            .join()
            .map_err(|_| CaptureError::StorageError("writer thread panicked".into()))
    }
}

/// Capture session: drives a native engine and streams its audio to a WAV file.
///
/// ```text
/// [native thread] → CallbackRegistry → CallbackBridge ─try_send→ [bounded queue]
///                                                                      ↓
///                                          [writer thread] → WavWriter → file
/// ```
///
/// While capturing, a full queue drops new buffers. `stop` drains everything
/// already queued before finalizing; `close` abandons the backlog.
pub struct CaptureSession<E: CaptureEngine> {
    engine: E,
    config: CaptureConfiguration,
    state: CaptureState,
    format: Option<AudioFormat>,
    registry: Arc<CallbackRegistry>,
    bridge: Arc<CallbackBridge>,
    token: Option<CallbackToken>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    counters: Arc<WriterCounters>,
    run: Option<CaptureRun>,
    last_path: Option<PathBuf>,
}

impl<E: CaptureEngine> CaptureSession<E> {
    pub fn new(engine: E, config: CaptureConfiguration) -> Self {
        Self {
            engine,
            config,
            state: CaptureState::Uninitialized,
            format: None,
            registry: Arc::new(CallbackRegistry::new()),
            bridge: Arc::new(CallbackBridge::new()),
            token: None,
            delegate: None,
            counters: Arc::new(WriterCounters::default()),
            run: None,
            last_path: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    /// Path of the current recording, or of the last one after `stop`.
    pub fn output_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }

    /// Counters for the current (or most recent) capture run.
    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            buffers_delivered: self.bridge.delivered(),
            buffers_dropped: self.bridge.dropped(),
            buffers_written: self.counters.buffers_written.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Acquire the native engine and query its format.
    /// Transitions: uninitialized → initialized.
    ///
    /// On failure the engine is released again and the session stays
    /// uninitialized; calling `initialize` again retries from scratch.
    pub fn initialize(&mut self) -> Result<(), CaptureError> {
        match self.state {
            CaptureState::Uninitialized => {}
            CaptureState::Closed => return Err(CaptureError::SessionClosed { operation: "initialize" }),
            state => {
                return Err(CaptureError::InvalidState {
                    operation: "initialize",
                    state,
                })
            }
        }

        self.config.validate().map_err(CaptureError::ConfigurationFailed)?;

        self.engine.open().map_err(|e| match e {
            CaptureError::EngineUnavailable(_) => e,
            other => CaptureError::EngineUnavailable(other.to_string()),
        })?;

        let format = match self.engine.format() {
            Ok(format) => format,
            Err(e) => {
                self.engine.destroy();
                return Err(match e {
                    CaptureError::FormatQueryFailed(_) => e,
                    other => CaptureError::FormatQueryFailed(other.to_string()),
                });
            }
        };

        let token = self.registry.register(Arc::clone(&self.bridge));
        let registry = Arc::clone(&self.registry);
        let sink: SampleSink = Arc::new(move |token: CallbackToken, samples: Option<&[f32]>| {
            registry.dispatch(token, samples);
        });
        self.engine.set_callback(sink, token);

        self.token = Some(token);
        self.format = Some(format);
        log::info!(
            "Capture engine initialized: {} Hz, {} ch, {} bit",
            format.sample_rate,
            format.channels,
            format.bits_per_sample
        );
        self.set_state(CaptureState::Initialized);
        Ok(())
    }

    /// Format delivered by the engine.
    pub fn format(&self) -> Result<AudioFormat, CaptureError> {
        self.ensure_usable("format")?;
        self.format.ok_or(CaptureError::NotInitialized { operation: "format" })
    }

    /// Install or replace the user tap invoked on the native thread for every
    /// delivered buffer. Safe to call while capturing.
    pub fn set_callback<F>(&self, callback: F) -> Result<(), CaptureError>
    where
        F: Fn(&SampleBuffer) + Send + Sync + 'static,
    {
        self.ensure_usable("set_callback")?;
        let tap: AudioCallback = Arc::new(callback);
        self.bridge.set_tap(Some(tap));
        Ok(())
    }

    /// Remove the user tap.
    pub fn clear_callback(&self) -> Result<(), CaptureError> {
        self.ensure_usable("clear_callback")?;
        self.bridge.set_tap(None);
        Ok(())
    }

    /// Applications currently producing audio, keyed by pid.
    pub fn list_applications(&self) -> Result<BTreeMap<u32, String>, CaptureError> {
        self.ensure_usable("list_applications")?;
        let apps = self.engine.list_applications()?;
        Ok(apps.into_iter().map(|app| (app.pid, app.name)).collect())
    }

    /// Start system-wide loopback capture into a new file.
    /// Transitions: initialized/stopped → capturing.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.begin("start", None)
    }

    /// Start loopback capture of one process into a new file.
    /// Transitions: initialized/stopped → capturing.
    pub fn start_capturing_process(&mut self, pid: u32) -> Result<(), CaptureError> {
        self.begin("start_capturing_process", Some(pid))
    }

    /// Stop capture, drain the queue, and finalize the file.
    /// Transitions: capturing → stopping → stopped.
    pub fn stop(&mut self) -> Result<RecordingResult, CaptureError> {
        self.ensure_usable("stop")?;
        if !self.state.is_capturing() {
            return Err(CaptureError::InvalidState {
                operation: "stop",
                state: self.state,
            });
        }
        let run = self.run.take().ok_or_else(|| CaptureError::InvalidState {
            operation: "stop",
            state: self.state,
        })?;

        self.set_state(CaptureState::Stopping);

        // No deliveries after engine.stop returns; detaching then closes the
        // queue for writing and the writer drains what is left.
        self.engine.stop();
        self.bridge.detach_queue();

        let path = run.path.clone();
        let outcome = run.join();
        self.set_state(CaptureState::Stopped);
        let outcome = outcome?;
        if let Err(e) = outcome.close_result {
            self.report_error(&e);
            return Err(e);
        }

        let format = self.format.ok_or(CaptureError::NotInitialized { operation: "stop" })?;
        let checksum = metadata::sha256_file(&path)?;
        let result = RecordingResult {
            file_path: path,
            format,
            data_size: outcome.data_size,
            frames_written: outcome.frames_written,
            duration_secs: outcome.duration_secs,
            stats: self.stats(),
            checksum,
        };

        if self.config.write_metadata {
            metadata::write_metadata(&RecordingMetadata::from_result(&result), &result.file_path)?;
        }

        log::info!(
            "Capture stopped: {} ({} bytes, {:.2}s, {} buffers written, {} dropped)",
            result.file_path.display(),
            result.data_size,
            result.duration_secs,
            result.stats.buffers_written,
            result.stats.buffers_dropped
        );

        if let Some(ref delegate) = self.delegate {
            delegate.on_capture_finished(&result);
        }
        Ok(result)
    }

    /// Release everything the session holds. Transitions: any → closed.
    ///
    /// A capture in progress is cancelled: queued buffers not yet written are
    /// abandoned, the file is still finalized for what was written. Calling
    /// `close` again is a no-op.
    pub fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }

        if let Some(run) = self.run.take() {
            self.engine.stop();
            run.abort.store(true, Ordering::Release);
            self.bridge.detach_queue();
            let path = run.path.clone();
            match run.join() {
                Ok(outcome) => {
                    if outcome.abandoned > 0 {
                        log::info!("Close abandoned {} queued buffers", outcome.abandoned);
                    }
                    if let Err(e) = &outcome.close_result {
                        log::error!("Failed to finalize {}: {}", path.display(), e);
                        self.report_error(e);
                    }
                }
                Err(e) => {
                    log::error!("{}", e);
                    self.report_error(&e);
                }
            }
        }

        if let Some(token) = self.token.take() {
            self.engine.clear_callback();
            self.registry.deregister(token);
        }
        if self.state.holds_engine() {
            self.engine.destroy();
        }
        self.bridge.set_tap(None);
        self.format = None;

        log::info!("Capture session closed");
        self.set_state(CaptureState::Closed);
    }

    // --- Internal helpers ---

    fn begin(&mut self, operation: &'static str, pid: Option<u32>) -> Result<(), CaptureError> {
        self.ensure_usable(operation)?;
        if !self.state.can_start() {
            return Err(CaptureError::InvalidState {
                operation,
                state: self.state,
            });
        }
        let format = self.format.ok_or(CaptureError::NotInitialized { operation })?;
        let token = self.token.ok_or(CaptureError::NotInitialized { operation })?;
        format.validate()?;

        let path = self.config.next_output_path();
        let writer = WavWriter::create(&path, format)?;

        // Fresh bridge per run so counters restart; the user tap carries over.
        let bridge = Arc::new(CallbackBridge::with_tap(self.bridge.tap()));
        self.registry.replace(token, Arc::clone(&bridge));
        self.bridge = bridge;
        self.counters = Arc::new(WriterCounters::default());

        let (sender, receiver) = crossbeam_channel::bounded(self.config.queue_capacity);
        let abort = Arc::new(AtomicBool::new(false));
        let handle = {
            let abort = Arc::clone(&abort);
            let counters = Arc::clone(&self.counters);
            let delegate = self.delegate.clone();
            thread::Builder::new()
                .name("loopback-capture-writer".into())
                .spawn(move || drain_into_writer(receiver, writer, &abort, &counters, delegate))
                .map_err(|e| CaptureError::CaptureStartFailed(format!("failed to spawn writer thread: {}", e)))
        };
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                remove_abandoned_file(&path);
                return Err(e);
            }
        };
        let run = CaptureRun { path, abort, handle };
        self.bridge.attach_queue(sender);

        let started = match pid {
            None => self.engine.start(),
            Some(pid) => self.engine.start_process(pid).map_err(|e| {
                log::error!("Engine refused to capture process {}: {}", pid, e);
                CaptureError::ProcessCaptureFailed(pid)
            }),
        };
        if let Err(e) = started {
            self.bridge.detach_queue();
            let path = run.path.clone();
            if let Err(join_err) = run.join() {
                log::error!("{}", join_err);
            }
            remove_abandoned_file(&path);
            return Err(e);
        }

        match pid {
            None => log::info!("Capture started: {}", run.path.display()),
            Some(pid) => log::info!("Capture of process {} started: {}", pid, run.path.display()),
        }
        self.last_path = Some(run.path.clone());
        self.run = Some(run);
        self.set_state(CaptureState::Capturing);
        Ok(())
    }

    fn ensure_usable(&self, operation: &'static str) -> Result<(), CaptureError> {
        match self.state {
            CaptureState::Closed => Err(CaptureError::SessionClosed { operation }),
            CaptureState::Uninitialized => Err(CaptureError::NotInitialized { operation }),
            _ => Ok(()),
        }
    }

    fn set_state(&mut self, new_state: CaptureState) {
        self.state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(new_state);
        }
    }

    fn report_error(&self, error: &CaptureError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }
}

impl<E: CaptureEngine> Drop for CaptureSession<E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Writer thread body: write every queued buffer in FIFO order until the
/// queue disconnects (stop) or `abort` is raised (close), then finalize.
fn drain_into_writer(
    receiver: Receiver<SampleBuffer>,
    mut writer: WavWriter,
    abort: &AtomicBool,
    counters: &WriterCounters,
    delegate: Option<Arc<dyn CaptureDelegate>>,
) -> WriterOutcome {
    let mut abandoned = 0;
    for buffer in receiver.iter() {
        if abort.load(Ordering::Acquire) {
            abandoned = 1 + receiver.len();
            break;
        }
        match writer.write_samples(buffer.samples()) {
            Ok(_) => {
                counters.buffers_written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.write_errors.fetch_add(1, Ordering::Relaxed);
                log::error!("Failed to write audio buffer: {}", e);
                if let Some(ref delegate) = delegate {
                    delegate.on_error(&e);
                }
            }
        }
        counters.bytes_written.store(writer.data_size(), Ordering::Relaxed);
    }

    let close_result = writer.close();
    WriterOutcome {
        close_result,
        data_size: writer.data_size(),
        frames_written: writer.frames_written(),
        duration_secs: writer.duration_secs(),
        abandoned,
    }
}

fn remove_abandoned_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Failed to remove {}: {}", path.display(), e);
    }
}

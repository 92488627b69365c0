use std::path::PathBuf;

/// Default ingestion queue depth, in buffers.
///
/// At a typical 10 ms callback cadence this holds roughly ten seconds of audio.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfiguration {
    /// Directory where recording files are written.
    pub output_directory: PathBuf,

    /// File name of the recording, or None for `recording_<uuid>.wav`.
    pub file_name: Option<String>,

    /// Capacity of the bounded queue between the native callback and the
    /// writer, in buffers (default: 1024).
    pub queue_capacity: usize,

    /// Write a `<recording>.metadata.json` sidecar on stop (default: false).
    pub write_metadata: bool,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("queue capacity must be at least 1".into());
        }
        if let Some(name) = &self.file_name {
            if name.is_empty() {
                return Err("file name must not be empty".into());
            }
            if name.contains(['/', '\\']) {
                return Err(format!("file name must not contain a path separator: {}", name));
            }
        }
        Ok(())
    }

    /// Path of the next recording file.
    ///
    /// Without a fixed `file_name` every call yields a fresh unique name. A
    /// fixed name records once; starting again while the file exists fails.
    pub fn next_output_path(&self) -> PathBuf {
        match &self.file_name {
            Some(name) => self.output_directory.join(name),
            None => self
                .output_directory
                .join(format!("recording_{}.wav", uuid::Uuid::new_v4())),
        }
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
            file_name: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_metadata: false,
        }
    }
}

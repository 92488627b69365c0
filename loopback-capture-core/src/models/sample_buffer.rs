use std::ops::Deref;
use std::sync::Arc;

/// Owned, immutable snapshot of one native callback delivery.
///
/// Samples are interleaved f32, nominally in `[-1.0, 1.0]`. Out-of-range
/// values are kept as delivered and clamped by the encoder. Clones share the
/// same storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
}

impl SampleBuffer {
    /// Copy `samples` into a new buffer.
    ///
    /// This is the only allocation on the native callback path.
    pub fn copy_from(samples: &[f32]) -> Self {
        Self {
            samples: Arc::from(samples),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Deref for SampleBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.samples
    }
}

impl From<Vec<f32>> for SampleBuffer {
    fn from(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into(),
        }
    }
}

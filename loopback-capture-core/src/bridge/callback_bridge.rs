use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;

use crate::models::sample_buffer::SampleBuffer;

/// User tap invoked on the native audio thread with every delivered buffer.
///
/// Runs before the buffer is queued for the writer; keep it short and
/// non-blocking.
pub type AudioCallback = Arc<dyn Fn(&SampleBuffer) + Send + Sync + 'static>;

/// What happened to one native delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Null or empty delivery, not counted.
    Ignored,
    /// Copied and queued for the writer.
    Enqueued,
    /// Copied, but the queue was full (or its consumer gone).
    Dropped,
    /// Copied and passed to the tap; no queue attached.
    Unrouted,
}

/// Routing snapshot read by the native thread. Replaced whole, never mutated.
#[derive(Default)]
struct BridgeTarget {
    queue: Option<Sender<SampleBuffer>>,
    tap: Option<AudioCallback>,
}

/// Boundary object invoked from the native audio thread.
///
/// Each delivery is copied into a [`SampleBuffer`] and offered to the bounded
/// ingestion queue with `try_send`; a full queue drops the buffer instead of
/// waiting. The native thread only ever takes the target read lock long
/// enough to clone an `Arc`.
pub struct CallbackBridge {
    target: RwLock<Arc<BridgeTarget>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
    drop_warned: AtomicBool,
}

impl CallbackBridge {
    pub fn new() -> Self {
        Self::with_tap(None)
    }

    pub fn with_tap(tap: Option<AudioCallback>) -> Self {
        Self {
            target: RwLock::new(Arc::new(BridgeTarget { queue: None, tap })),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            drop_warned: AtomicBool::new(false),
        }
    }

    /// Handle one delivery from the native engine.
    ///
    /// `None` stands for a null native buffer.
    pub fn on_samples(&self, samples: Option<&[f32]>) -> Delivery {
        let samples = match samples {
            Some(s) if !s.is_empty() => s,
            _ => return Delivery::Ignored,
        };

        let buffer = SampleBuffer::copy_from(samples);
        self.delivered.fetch_add(1, Ordering::Relaxed);

        let target = Arc::clone(&self.target.read());
        if let Some(tap) = &target.tap {
            tap(&buffer);
        }

        let Some(queue) = &target.queue else {
            return Delivery::Unrouted;
        };
        match queue.try_send(buffer) {
            Ok(()) => Delivery::Enqueued,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if !self.drop_warned.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "Ingestion queue full, dropping audio buffers (capacity {:?}, {} dropped so far)",
                        queue.capacity(),
                        dropped
                    );
                }
                Delivery::Dropped
            }
        }
    }

    /// Handle a raw `(buffer, frame_count)` delivery from a C engine.
    ///
    /// # Safety
    ///
    /// When `buffer` is non-null and `frame_count > 0`, `buffer` must point to
    /// `frame_count` initialized `f32` values that stay valid for the call.
    pub unsafe fn on_raw_samples(&self, buffer: *const f32, frame_count: c_int) -> Delivery {
        self.on_samples(samples_from_raw(buffer, frame_count))
    }

    /// Route subsequent deliveries into `queue`.
    pub fn attach_queue(&self, queue: Sender<SampleBuffer>) {
        self.drop_warned.store(false, Ordering::Relaxed);
        self.swap(|current| BridgeTarget {
            queue: Some(queue),
            tap: current.tap.clone(),
        });
    }

    /// Stop routing into the queue. Returns whether one was attached.
    ///
    /// Once every in-flight delivery has finished, the queue's receiver sees
    /// the channel disconnect after draining what is already queued.
    pub fn detach_queue(&self) -> bool {
        let mut attached = false;
        self.swap(|current| {
            attached = current.queue.is_some();
            BridgeTarget {
                queue: None,
                tap: current.tap.clone(),
            }
        });
        attached
    }

    /// Install, replace, or (with `None`) remove the user tap.
    pub fn set_tap(&self, tap: Option<AudioCallback>) {
        self.swap(|current| BridgeTarget {
            queue: current.queue.clone(),
            tap,
        });
    }

    pub fn tap(&self) -> Option<AudioCallback> {
        self.target.read().tap.clone()
    }

    pub fn has_queue(&self) -> bool {
        self.target.read().queue.is_some()
    }

    /// Non-empty deliveries seen, including dropped ones.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Deliveries discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn swap(&self, next: impl FnOnce(&BridgeTarget) -> BridgeTarget) {
        let mut target = self.target.write();
        let replacement = Arc::new(next(&target));
        *target = replacement;
    }
}

impl Default for CallbackBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// View a native `(buffer, frame_count)` pair as a slice.
///
/// Null buffers map to `None`; non-positive counts map to an empty slice.
///
/// # Safety
///
/// Same contract as [`CallbackBridge::on_raw_samples`]. The returned slice
/// must not outlive the native callback.
pub unsafe fn samples_from_raw<'a>(buffer: *const f32, frame_count: c_int) -> Option<&'a [f32]> {
    if buffer.is_null() {
        return None;
    }
    if frame_count <= 0 {
        return Some(&[]);
    }
    Some(std::slice::from_raw_parts(buffer, frame_count as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn empty_and_null_deliveries_are_ignored() {
        let bridge = CallbackBridge::new();
        let (tx, rx) = crossbeam_channel::bounded(4);
        bridge.attach_queue(tx);

        assert_eq!(bridge.on_samples(None), Delivery::Ignored);
        assert_eq!(bridge.on_samples(Some(&[])), Delivery::Ignored);
        assert_eq!(unsafe { bridge.on_raw_samples(std::ptr::null(), 10) }, Delivery::Ignored);
        let data = [0.5f32; 4];
        assert_eq!(unsafe { bridge.on_raw_samples(data.as_ptr(), 0) }, Delivery::Ignored);
        assert_eq!(unsafe { bridge.on_raw_samples(data.as_ptr(), -3) }, Delivery::Ignored);

        assert_eq!(bridge.delivered(), 0);
        assert!(rx.is_empty());
    }

    #[test]
    fn raw_delivery_copies_exactly_frame_count_samples() {
        let bridge = CallbackBridge::new();
        let (tx, rx) = crossbeam_channel::bounded(4);
        bridge.attach_queue(tx);

        let mut native = vec![0.1f32, 0.2, 0.3, 0.4];
        assert_eq!(unsafe { bridge.on_raw_samples(native.as_ptr(), 3) }, Delivery::Enqueued);
        native.iter_mut().for_each(|s| *s = 9.0);

        let buffer = rx.try_recv().unwrap();
        assert_eq!(buffer.samples(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let capacity = 8;
        let bridge = CallbackBridge::new();
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        bridge.attach_queue(tx);

        let outcomes: Vec<Delivery> = (0..capacity + 5)
            .map(|i| bridge.on_samples(Some(&[i as f32; 2])))
            .collect();

        assert_eq!(outcomes.iter().filter(|d| **d == Delivery::Enqueued).count(), capacity);
        assert_eq!(outcomes.iter().filter(|d| **d == Delivery::Dropped).count(), 5);
        assert_eq!(bridge.dropped(), 5);
        assert_eq!(bridge.delivered(), capacity as u64 + 5);

        // The survivors are the first `capacity` deliveries, in order.
        let firsts: Vec<f32> = rx.try_iter().map(|b| b.samples()[0]).collect();
        assert_eq!(firsts, (0..capacity).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn preserves_fifo_order() {
        let bridge = CallbackBridge::new();
        let (tx, rx) = crossbeam_channel::bounded(16);
        bridge.attach_queue(tx);

        let a = [0.1f32, 0.1];
        let b = [0.2f32, 0.2, 0.2];
        let c = [0.3f32];
        bridge.on_samples(Some(&a));
        bridge.on_samples(Some(&b));
        bridge.on_samples(Some(&c));

        let received: Vec<SampleBuffer> = rx.try_iter().collect();
        assert_eq!(received[0].samples(), &a);
        assert_eq!(received[1].samples(), &b);
        assert_eq!(received[2].samples(), &c);
    }

    #[test]
    fn detach_closes_queue_for_writing_but_keeps_backlog() {
        let bridge = CallbackBridge::new();
        let (tx, rx) = crossbeam_channel::bounded(4);
        bridge.attach_queue(tx);
        bridge.on_samples(Some(&[1.0]));

        assert!(bridge.detach_queue());
        assert!(!bridge.has_queue());
        assert_eq!(bridge.on_samples(Some(&[2.0])), Delivery::Unrouted);
        assert_eq!(bridge.dropped(), 0);

        let drained: Vec<SampleBuffer> = rx.iter().collect();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].samples(), &[1.0]);
        assert!(!bridge.detach_queue());
    }

    #[test]
    fn tap_sees_every_delivery_and_can_be_swapped() {
        let bridge = CallbackBridge::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&first);
        bridge.set_tap(Some(Arc::new(move |b: &SampleBuffer| sink.lock().push(b.len()))));
        bridge.on_samples(Some(&[0.0; 3]));

        let sink = Arc::clone(&second);
        bridge.set_tap(Some(Arc::new(move |b: &SampleBuffer| sink.lock().push(b.len()))));
        bridge.on_samples(Some(&[0.0; 5]));

        bridge.set_tap(None);
        bridge.on_samples(Some(&[0.0; 7]));

        assert_eq!(*first.lock(), vec![3]);
        assert_eq!(*second.lock(), vec![5]);
        assert!(bridge.tap().is_none());
    }

    #[test]
    fn tap_survives_queue_swaps() {
        let seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&seen);
        let tap: AudioCallback = Arc::new(move |_: &SampleBuffer| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let bridge = CallbackBridge::with_tap(Some(tap));

        let (tx, _rx) = crossbeam_channel::bounded(4);
        bridge.attach_queue(tx);
        bridge.on_samples(Some(&[0.0]));
        bridge.detach_queue();
        bridge.on_samples(Some(&[0.0]));

        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn disconnected_consumer_counts_as_drop() {
        let bridge = CallbackBridge::new();
        let (tx, rx) = crossbeam_channel::bounded(4);
        bridge.attach_queue(tx);
        drop(rx);
        assert_eq!(bridge.on_samples(Some(&[0.0])), Delivery::Dropped);
        assert_eq!(bridge.dropped(), 1);
    }

    #[test]
    fn concurrent_swaps_never_tear() {
        let bridge = Arc::new(CallbackBridge::new());
        let (tx, rx) = crossbeam_channel::bounded(100_000);

        let producer = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    bridge.on_samples(Some(&[0.25]));
                }
            })
        };
        for i in 0..1_000 {
            if i % 2 == 0 {
                bridge.attach_queue(tx.clone());
            } else {
                bridge.detach_queue();
            }
        }
        producer.join().unwrap();
        bridge.detach_queue();
        drop(tx);

        let enqueued = rx.iter().count() as u64;
        assert_eq!(bridge.delivered(), 10_000);
        assert!(enqueued <= 10_000);
        assert_eq!(bridge.dropped(), 0);
    }
}

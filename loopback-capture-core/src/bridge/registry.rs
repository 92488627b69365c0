use std::sync::Arc;

use parking_lot::RwLock;

use super::callback_bridge::{CallbackBridge, Delivery};

/// Opaque handle passed through a native engine as its callback user data.
///
/// Packs a slot index (low 32 bits) and a generation (high 32 bits).
/// Generations start at 1, so the raw value is never 0 and a null user-data
/// pointer never resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackToken(u64);

impl CallbackToken {
    fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 & u32::MAX as u64) as usize
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

struct Slot {
    generation: u32,
    bridge: Option<Arc<CallbackBridge>>,
}

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Arena {
    fn slot(&self, token: CallbackToken) -> Option<&Slot> {
        self.slots
            .get(token.index())
            .filter(|slot| slot.generation == token.generation() && slot.bridge.is_some())
    }

    fn slot_mut(&mut self, token: CallbackToken) -> Option<&mut Slot> {
        self.slots
            .get_mut(token.index())
            .filter(|slot| slot.generation == token.generation() && slot.bridge.is_some())
    }
}

/// Session-scoped map from [`CallbackToken`] to the bridge it routes to.
///
/// Register, lookup, replace and deregister are each atomic. Lookups take
/// the read lock only long enough to clone an `Arc`, so the native thread
/// never waits behind file I/O.
#[derive(Default)]
pub struct CallbackRegistry {
    arena: RwLock<Arena>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, bridge: Arc<CallbackBridge>) -> CallbackToken {
        let mut arena = self.arena.write();
        if let Some(index) = arena.free.pop() {
            let slot = &mut arena.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1).max(1);
            slot.bridge = Some(bridge);
            return CallbackToken::new(index, slot.generation);
        }

        let index = arena.slots.len() as u32;
        arena.slots.push(Slot {
            generation: 1,
            bridge: Some(bridge),
        });
        CallbackToken::new(index, 1)
    }

    pub fn lookup(&self, token: CallbackToken) -> Option<Arc<CallbackBridge>> {
        self.arena.read().slot(token).and_then(|slot| slot.bridge.clone())
    }

    /// Point a live token at a different bridge. Returns false for stale tokens.
    pub fn replace(&self, token: CallbackToken, bridge: Arc<CallbackBridge>) -> bool {
        match self.arena.write().slot_mut(token) {
            Some(slot) => {
                slot.bridge = Some(bridge);
                true
            }
            None => false,
        }
    }

    pub fn deregister(&self, token: CallbackToken) -> Option<Arc<CallbackBridge>> {
        let mut arena = self.arena.write();
        let removed = arena.slot_mut(token)?.bridge.take();
        arena.free.push(token.index() as u32);
        removed
    }

    /// Route one native delivery to the bridge registered under `token`.
    ///
    /// Unknown or stale tokens are ignored.
    pub fn dispatch(&self, token: CallbackToken, samples: Option<&[f32]>) -> Delivery {
        match self.lookup(token) {
            Some(bridge) => bridge.on_samples(samples),
            None => Delivery::Ignored,
        }
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.arena.read().slots.iter().filter(|s| s.bridge.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Platform pointer id → finger slot mapping.

use log::warn;

/// Maximum number of concurrently tracked fingers.
pub const MAX_SLOTS: usize = 10;

pub type PointerId = i64;
pub type Slot = usize;

#[derive(Debug)]
pub struct FingerRegistry {
    // index = slot, value = pointer currently holding it
    slots: Vec<Option<PointerId>>,
}

impl Default for FingerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SLOTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Assigns the lowest free slot. A pointer that is already down keeps
    /// its slot. Returns `None` when every slot is taken.
    pub fn on_press(&mut self, pointer: PointerId) -> Option<Slot> {
        if let Some(slot) = self.slot_for(pointer) {
            return Some(slot);
        }
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(pointer);
                Some(slot)
            }
            None => {
                warn!(
                    "pointer {pointer} ignored: all {} finger slots in use",
                    self.capacity()
                );
                None
            }
        }
    }

    /// Frees the pointer's slot. Unknown pointers are a no-op.
    pub fn on_release(&mut self, pointer: PointerId) -> Option<Slot> {
        let slot = self.slot_for(pointer)?;
        self.slots[slot] = None;
        Some(slot)
    }

    pub fn slot_for(&self, pointer: PointerId) -> Option<Slot> {
        self.slots.iter().position(|s| *s == Some(pointer))
    }
}

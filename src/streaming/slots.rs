//! Slot allocation in the shared LOD texture

use std::collections::{HashSet, VecDeque};

use crate::cell::model::SlotRect;

/// Fixed-size square slots tiling the LOD texture.
///
/// A slot is either open or held by exactly one active cell.
#[derive(Clone, Debug)]
pub struct SlotTable {
    open: VecDeque<SlotRect>,
    in_use: HashSet<u32>,
    total: usize,
}

impl SlotTable {
    /// Tile a `texture_px` square texture with `slot_px` slots, row-major.
    pub fn new(texture_px: u32, slot_px: u32) -> Self {
        let per_row = if slot_px == 0 { 0 } else { texture_px / slot_px };
        let open: VecDeque<SlotRect> = (0..per_row * per_row)
            .map(|id| SlotRect {
                id,
                x: (id % per_row) * slot_px,
                y: (id / per_row) * slot_px,
                size: slot_px,
            })
            .collect();
        let total = open.len();
        Self { open, in_use: HashSet::new(), total }
    }

    /// Take an open slot, if any.
    pub fn acquire(&mut self) -> Option<SlotRect> {
        let slot = self.open.pop_front()?;
        self.in_use.insert(slot.id);
        Some(slot)
    }

    /// Return a slot. Releasing a slot that is not held is a no-op.
    pub fn release(&mut self, slot: SlotRect) -> bool {
        if !self.in_use.remove(&slot.id) {
            log::warn!("Released LOD slot {} that was not in use", slot.id);
            return false;
        }
        self.open.push_back(slot);
        true
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn available(&self) -> usize {
        self.open.len()
    }
}

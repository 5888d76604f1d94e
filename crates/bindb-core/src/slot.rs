//! Slot allocator: id↔slot bidirectional map plus a LIFO free-slot stack
//! (§4.4).

use ahash::AHashMap;

use crate::id::Id;

/// One entry in the dense slot table.
#[derive(Debug, Clone, Copy)]
enum SlotEntry {
    Active(Id),
    Tombstone,
}

/// A row scanned off disk at load time, used to rebuild allocator state.
#[derive(Debug, Clone, Copy)]
pub enum ScannedSlot {
    Active(Id),
    Tombstone,
}

/// Maintains the id↔slot bijection (invariant (i), §3) and the free-slot
/// LIFO stack that governs reuse ordering.
#[derive(Debug, Default)]
pub struct SlotAllocator {
    slots: Vec<SlotEntry>,
    by_id: AHashMap<Id, u64>,
    free: Vec<u64>,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds allocator state from a slot-index-ordered scan of the data
    /// file (§4.4 `load`). Tombstoned entries land on the free stack in scan
    /// order, so the most recently scanned tombstone is reused first.
    pub fn load<I: IntoIterator<Item = ScannedSlot>>(entries: I) -> Self {
        let mut allocator = Self::new();
        for entry in entries {
            match entry {
                ScannedSlot::Active(id) => {
                    let slot = allocator.slots.len() as u64;
                    allocator.slots.push(SlotEntry::Active(id));
                    allocator.by_id.insert(id, slot);
                }
                ScannedSlot::Tombstone => {
                    let slot = allocator.slots.len() as u64;
                    allocator.slots.push(SlotEntry::Tombstone);
                    allocator.free.push(slot);
                }
            }
        }
        allocator
    }

    /// Allocates a slot for `id`: reuses the most recently freed slot (LIFO)
    /// if one exists, else appends a new slot at the end.
    pub fn allocate(&mut self, id: Id) -> u64 {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = SlotEntry::Active(id);
                slot
            }
            None => {
                let slot = self.slots.len() as u64;
                self.slots.push(SlotEntry::Active(id));
                slot
            }
        };
        self.by_id.insert(id, slot);
        slot
    }

    /// Releases `id`'s slot back to the free stack. Returns `false` if `id`
    /// is not currently allocated.
    pub fn deallocate(&mut self, id: &Id) -> bool {
        match self.by_id.remove(id) {
            Some(slot) => {
                self.slots[slot as usize] = SlotEntry::Tombstone;
                self.free.push(slot);
                true
            }
            None => false,
        }
    }

    pub fn resolve(&self, id: &Id) -> Option<u64> {
        self.by_id.get(id).copied()
    }

    pub fn is_active(&self, slot: u64) -> bool {
        matches!(self.slots.get(slot as usize), Some(SlotEntry::Active(_)))
    }

    /// Total number of slots ever allocated (dense, includes tombstones).
    pub fn slot_count(&self) -> u64 {
        self.slots.len() as u64
    }

    pub fn active_count(&self) -> u64 {
        self.by_id.len() as u64
    }

    pub fn free_count(&self) -> u64 {
        self.free.len() as u64
    }

    /// All currently-active ids, for `getAll()`-style scans (§8 scenario 6).
    pub fn active_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.by_id.keys().copied()
    }
}

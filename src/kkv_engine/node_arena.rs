use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::kkv_engine::constants::INVALID_OFFSET;

/// Fixed-capacity, append-only node arena addressed by `u32` offsets.
///
/// This is the memory backbone of a building segment: nodes are appended
/// once, never moved, never reclaimed, and identified by their insertion
/// offset — a stable integer "pointer" that stays valid for the life of the
/// segment and can be stored inside other nodes (`next` links, list heads).
///
/// # Concurrency contract
/// - Exactly **one writer thread** may call [`NodeArena::append`]. The write
///   of a slot happens strictly before the `Release` store that publishes
///   the new length, so a reader that observed an offset through any
///   `Acquire` load (the arena length, a node's `next` link, a list header)
///   sees the slot fully initialized.
/// - Any number of reader threads may call [`NodeArena::get`] concurrently
///   with the writer, but only with offsets obtained from published shared
///   state. Fields that mutate *after* publication (`next` links, skip-list
///   block counters) are atomics inside `T` itself; everything else is
///   write-once.
/// - The arena never resizes, so `&T` references handed out by `get` are
///   never invalidated by later appends.
pub struct NodeArena<T> {
    slots: Box<[UnsafeCell<T>]>,
    len: AtomicU32,
}

// SAFETY: slot mutation is confined to `append` under the documented
// single-writer contract, and a slot is only reachable by readers after the
// Release publication of the length (or of a link naming its offset).
unsafe impl<T: Send + Sync> Sync for NodeArena<T> {}
unsafe impl<T: Send> Send for NodeArena<T> {}

impl<T: Default> NodeArena<T> {
    /// Creates an arena with room for exactly `capacity` nodes.
    ///
    /// Slots are default-initialized up front; the arena allocates its whole
    /// reserve once and never again. Capacities at or above the offset
    /// sentinel are clamped so every valid slot has a representable offset.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min((INVALID_OFFSET - 1) as usize);
        let slots: Box<[UnsafeCell<T>]> =
            (0..capacity).map(|_| UnsafeCell::new(T::default())).collect();

        Self {
            slots,
            len: AtomicU32::new(0),
        }
    }
}

impl<T> NodeArena<T> {
    /// Total number of slots reserved at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of appended (published) nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once every reserved slot has been used.
    ///
    /// This is authoritative: once full, every further [`NodeArena::append`]
    /// fails until the whole segment is discarded.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len.load(Ordering::Relaxed) as usize >= self.slots.len()
    }

    /// Slots still available to the writer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.slots.len() - self.len.load(Ordering::Relaxed) as usize
    }

    /// Appends a node and publishes it, returning its stable offset.
    ///
    /// # Returns
    /// - `Some(offset)`: The node is stored and visible to readers that
    ///   acquire the new length or a link naming the offset.
    /// - `None`: The arena is full; nothing was written.
    ///
    /// # Safety contract (not enforced by the compiler)
    /// - Must only be called from the segment's single writer thread.
    #[inline]
    pub fn append(&self, node: T) -> Option<u32> {
        let offset = self.len.load(Ordering::Relaxed);
        if offset as usize >= self.slots.len() {
            return None;
        }

        // SAFETY: `offset` is unpublished, so no reader can hold a reference
        // into this slot; the single-writer contract rules out a concurrent
        // `append` racing on it.
        unsafe {
            *self.slots[offset as usize].get() = node;
        }

        // Publish: everything written to the slot above happens-before any
        // reader that acquires this length (or a link derived from it).
        self.len.store(offset + 1, Ordering::Release);

        Some(offset)
    }

    /// Returns the node at `offset`.
    ///
    /// # Panics
    /// - If `offset` was never returned by [`NodeArena::append`]. Offsets
    ///   must come from published shared state, never be fabricated.
    #[inline]
    pub fn get(&self, offset: u32) -> &T {
        debug_assert!(
            offset < self.len.load(Ordering::Acquire),
            "arena offset {offset} not published"
        );

        // SAFETY: published slots are never written again through
        // `UnsafeCell` (post-publication mutation goes through atomics
        // inside `T`), so a shared reference is sound.
        unsafe { &*self.slots[offset as usize].get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_dense_offsets_until_full() {
        let arena: NodeArena<u64> = NodeArena::with_capacity(3);

        assert_eq!(arena.append(10), Some(0));
        assert_eq!(arena.append(11), Some(1));
        assert_eq!(arena.append(12), Some(2));
        assert!(arena.is_full());
        assert_eq!(arena.append(13), None, "full arena must refuse appends");

        assert_eq!(*arena.get(0), 10);
        assert_eq!(*arena.get(2), 12);
    }

    #[test]
    fn capacity_is_fixed_at_construction() {
        let arena: NodeArena<u64> = NodeArena::with_capacity(8);
        assert_eq!(arena.capacity(), 8);
        assert_eq!(arena.remaining(), 8);

        arena.append(1).unwrap();
        assert_eq!(arena.capacity(), 8);
        assert_eq!(arena.remaining(), 7);
    }
}

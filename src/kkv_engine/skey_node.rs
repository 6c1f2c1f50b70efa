use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::kkv_engine::constants::{
    INVALID_OFFSET, INVALID_VALUE_OFFSET, SKEY_ALL_DELETED_OFFSET, UNINITIALIZED_EXPIRE_TIME,
};
use crate::kkv_engine::suffix_key::SuffixKey;

/// One suffix-key record in a building segment.
///
/// Everything except `next` is written exactly once, before the node is
/// published (linked from a predecessor or a list header). `next` is the one
/// field spliced after publication, so it is the one atomic.
#[derive(Debug)]
pub struct SkeyNode<S> {
    next: AtomicU32,
    pub skey: S,
    pub timestamp: u32,
    pub expire_time: u32,
    pub value_offset: u64,
}

impl<S: SuffixKey> Default for SkeyNode<S> {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(INVALID_OFFSET),
            skey: S::from_raw(0),
            timestamp: 0,
            expire_time: UNINITIALIZED_EXPIRE_TIME,
            value_offset: INVALID_VALUE_OFFSET,
        }
    }
}

impl<S: SuffixKey> SkeyNode<S> {
    pub fn new(skey: S, timestamp: u32, expire_time: u32, value_offset: u64) -> Self {
        Self {
            next: AtomicU32::new(INVALID_OFFSET),
            skey,
            timestamp,
            expire_time,
            value_offset,
        }
    }

    /// Offset of the next node in ascending skey order, or `INVALID_OFFSET`.
    #[inline]
    pub fn next(&self) -> u32 {
        self.next.load(Ordering::Acquire)
    }

    /// Splices `offset` in as the successor. Release so the pointed-to
    /// node's write-once fields are visible to any reader following the link.
    #[inline]
    pub fn set_next(&self, offset: u32) {
        self.next.store(offset, Ordering::Release);
    }

    /// `true` when this node is a delete tombstone for its own suffix key.
    #[inline]
    pub fn is_skey_deleted(&self) -> bool {
        self.value_offset == INVALID_VALUE_OFFSET
    }

    /// `true` when this node is a whole-prefix-key delete tombstone.
    #[inline]
    pub fn is_pkey_deleted(&self) -> bool {
        self.value_offset == SKEY_ALL_DELETED_OFFSET
    }
}

/// One skip-list block guarding a run of [`SkeyNode`]s.
///
/// A block records the minimum suffix key of its run (`min_skey`), the head
/// node of the run (`skey_offset`), and how many nodes the run currently
/// holds. Unlike skey nodes, blocks mutate after publication — inserts bump
/// `count`, head inserts repoint `skey_offset`/`min_skey`, splits rewrite
/// `next` — so every field is an atomic. The suffix key is stored widened to
/// `u64` (see [`SuffixKey::to_raw`]).
#[derive(Debug)]
pub struct ListNode<S> {
    next: AtomicU32,
    skey_offset: AtomicU32,
    count: AtomicU32,
    min_skey: AtomicU64,
    _marker: PhantomData<S>,
}

impl<S: SuffixKey> Default for ListNode<S> {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(INVALID_OFFSET),
            skey_offset: AtomicU32::new(INVALID_OFFSET),
            count: AtomicU32::new(0),
            min_skey: AtomicU64::new(0),
            _marker: PhantomData,
        }
    }
}

impl<S: SuffixKey> ListNode<S> {
    pub fn new(min_skey: S, skey_offset: u32, count: u32) -> Self {
        Self {
            next: AtomicU32::new(INVALID_OFFSET),
            skey_offset: AtomicU32::new(skey_offset),
            count: AtomicU32::new(count),
            min_skey: AtomicU64::new(min_skey.to_raw()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn next(&self) -> u32 {
        self.next.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_next(&self, offset: u32) {
        self.next.store(offset, Ordering::Release);
    }

    /// Head [`SkeyNode`] of the run this block guards.
    #[inline]
    pub fn skey_offset(&self) -> u32 {
        self.skey_offset.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_skey_offset(&self, offset: u32) {
        self.skey_offset.store(offset, Ordering::Release);
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_count(&self, count: u32) {
        self.count.store(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_count(&self) -> u32 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Minimum suffix key of the guarded run.
    #[inline]
    pub fn min_skey(&self) -> S {
        S::from_raw(self.min_skey.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_min_skey(&self, skey: S) {
        self.min_skey.store(skey.to_raw(), Ordering::Relaxed);
    }
}

/// Per-prefix-key list descriptor — the value stored in the prefix-key table.
///
/// Shared between the single writer and any number of concurrent readers
/// (behind an `Arc`), so the three fields are atomics. `skey_header` is the
/// publication point a reader enters through; its `Release` stores order
/// everything the writer did beforehand.
#[derive(Debug)]
pub struct SkeyListInfo {
    skey_header: AtomicU32,
    block_header: AtomicU32,
    count: AtomicU32,
}

impl Default for SkeyListInfo {
    fn default() -> Self {
        Self {
            skey_header: AtomicU32::new(INVALID_OFFSET),
            block_header: AtomicU32::new(INVALID_OFFSET),
            count: AtomicU32::new(0),
        }
    }
}

impl SkeyListInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the first [`SkeyNode`], or `INVALID_OFFSET` for an empty
    /// list (a freshly inserted prefix key that has not linked yet).
    #[inline]
    pub fn skey_header(&self) -> u32 {
        self.skey_header.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_skey_header(&self, offset: u32) {
        self.skey_header.store(offset, Ordering::Release);
    }

    /// Offset of the first skip-list block, or `INVALID_OFFSET` while the
    /// list is still short enough to scan flat.
    #[inline]
    pub fn block_header(&self) -> u32 {
        self.block_header.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_block_header(&self, offset: u32) {
        self.block_header.store(offset, Ordering::Release);
    }

    /// Number of reachable suffix-key nodes (tombstones included).
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn increment_count(&self) -> u32 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Resets the descriptor so the whole-pkey tombstone at
    /// `tombstone_offset` is the entire list.
    ///
    /// Order matters: the auxiliary fields are cleared first and the header
    /// is stored last with `Release`, so a reader that acquires the new
    /// header can never combine it with the pre-delete block chain.
    pub fn reset_for_pkey_delete(&self, tombstone_offset: u32) {
        self.count.store(1, Ordering::Relaxed);
        self.block_header.store(INVALID_OFFSET, Ordering::Relaxed);
        self.skey_header.store(tombstone_offset, Ordering::Release);
    }
}

use std::sync::Arc;

use crate::kkv_engine::constants::INVALID_OFFSET;
use crate::kkv_engine::skey_node::SkeyListInfo;
use crate::kkv_engine::skey_writer::{SeekCursor, SkeyWriter};
use crate::kkv_engine::suffix_key::SuffixKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IteratorState {
    Fresh,
    Valid,
    Exhausted,
}

/// Read cursor over one prefix key's suffix-key list in a building segment.
///
/// Safe to use from a different thread than the writer: every hop goes
/// through published offsets (see [`crate::kkv_engine::NodeArena`]). The
/// iterator observes a prefix of the writer's work — entries linked after a
/// hop may or may not be visible, but nothing is ever seen half-written.
///
/// A leading whole-pkey tombstone is consumed at construction: the iterator
/// records its presence and timestamp, then positions on the first real
/// entry, so consumers always see `has_pkey_deleted` before any records.
///
/// [`BuildingSkeyIterator::move_to_skey`] is the merge/point-lookup path and
/// expects non-decreasing targets across calls; plain forward scans should
/// use [`BuildingSkeyIterator::move_to_next`].
pub struct BuildingSkeyIterator<S: SuffixKey> {
    writer: Arc<SkeyWriter<S>>,
    info: Arc<SkeyListInfo>,
    state: IteratorState,
    current: u32,
    has_pkey_deleted: bool,
    pkey_deleted_ts: u32,
    cursor: SeekCursor,
}

impl<S: SuffixKey> BuildingSkeyIterator<S> {
    pub fn new(writer: Arc<SkeyWriter<S>>, info: Arc<SkeyListInfo>) -> Self {
        let mut iter = Self {
            writer,
            info,
            state: IteratorState::Fresh,
            current: INVALID_OFFSET,
            has_pkey_deleted: false,
            pkey_deleted_ts: 0,
            cursor: SeekCursor::new(),
        };

        let head = iter.info.skey_header();
        if head == INVALID_OFFSET {
            iter.state = IteratorState::Exhausted;
            return iter;
        }

        iter.current = head;
        let node = iter.writer.skey_node(head);
        if node.is_pkey_deleted() {
            iter.has_pkey_deleted = true;
            iter.pkey_deleted_ts = node.timestamp;
            iter.current = node.next();
            if iter.current == INVALID_OFFSET {
                iter.state = IteratorState::Exhausted;
            }
        }

        iter
    }

    /// `true` while the cursor is on a readable entry.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.state != IteratorState::Exhausted
    }

    /// `true` if the list starts with a whole-pkey delete tombstone.
    #[inline]
    pub fn has_pkey_deleted(&self) -> bool {
        self.has_pkey_deleted
    }

    /// Timestamp of the whole-pkey tombstone; meaningful only when
    /// [`BuildingSkeyIterator::has_pkey_deleted`] is `true`.
    #[inline]
    pub fn pkey_deleted_ts(&self) -> u32 {
        self.pkey_deleted_ts
    }

    #[inline]
    pub fn skey(&self) -> S {
        debug_assert!(self.is_valid());
        self.writer.skey_node(self.current).skey
    }

    /// `true` when the entry under the cursor is a suffix-key tombstone.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        debug_assert!(self.is_valid());
        self.writer.skey_node(self.current).is_skey_deleted()
    }

    #[inline]
    pub fn timestamp(&self) -> u32 {
        debug_assert!(self.is_valid());
        self.writer.skey_node(self.current).timestamp
    }

    #[inline]
    pub fn expire_time(&self) -> u32 {
        debug_assert!(self.is_valid());
        self.writer.skey_node(self.current).expire_time
    }

    #[inline]
    pub fn value_offset(&self) -> u64 {
        debug_assert!(self.is_valid());
        self.writer.skey_node(self.current).value_offset
    }

    /// Advances to the next entry in ascending skey order.
    pub fn move_to_next(&mut self) {
        if self.state == IteratorState::Exhausted {
            return;
        }

        self.current = self.writer.skey_node(self.current).next();
        if self.current == INVALID_OFFSET {
            self.state = IteratorState::Exhausted;
        } else {
            self.state = IteratorState::Valid;
        }
    }

    /// Forward-only point seek via the writer's resumable cursor.
    ///
    /// Targets must be non-decreasing across calls on one iterator; each
    /// seek then costs amortized O(sqrt(n)) instead of a fresh walk.
    ///
    /// # Returns
    /// - `true`: Exact live match; the cursor is on it.
    /// - `false`: No live match. The cursor lands on the first entry
    ///   `> target` (or the target's own tombstone), or the iterator
    ///   becomes invalid when the list is exhausted.
    pub fn move_to_skey(&mut self, target: S) -> bool {
        if self.state == IteratorState::Exhausted {
            return false;
        }

        match self
            .writer
            .seek_target_skey(&self.info, target, &mut self.cursor)
        {
            Some(offset) => {
                self.current = offset;
                self.state = IteratorState::Valid;
                true
            }
            None => {
                if self.cursor.is_exhausted() {
                    self.state = IteratorState::Exhausted;
                    self.current = INVALID_OFFSET;
                } else {
                    self.current = self.cursor.node_offset();
                    self.state = IteratorState::Valid;
                }
                false
            }
        }
    }
}

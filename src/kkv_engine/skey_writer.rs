use std::sync::atomic::{AtomicU32, Ordering};

use tracing::warn;

use crate::kkv_engine::constants::{DEFAULT_LONG_TAIL_THRESHOLD, INVALID_OFFSET};
use crate::kkv_engine::node_arena::NodeArena;
use crate::kkv_engine::skey_node::{ListNode, SkeyListInfo, SkeyNode};
use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;

/// Sizing and policy knobs for one [`SkeyWriter`].
///
/// The skip-list constants are deliberately configuration, not literals: the
/// block capacity is derived as `floor(sqrt(long_tail_threshold))`, and a
/// block splits when `block_count² > 4 × list_count`, which keeps block
/// sizes near the square root of the list length.
#[derive(Debug, Clone)]
pub struct SkeyWriterOptions {
    /// Byte budget backing both node arenas. Sized once, never grown.
    pub reserve_bytes: usize,
    /// List length at which a per-pkey skip list is built.
    pub long_tail_threshold: u32,
    /// Per-pkey cap on *new* suffix keys. Replaces and deletes of existing
    /// keys are never refused. Defaults to "no cap".
    pub max_link_step: u32,
}

impl SkeyWriterOptions {
    pub fn new(reserve_bytes: usize) -> Self {
        Self {
            reserve_bytes,
            long_tail_threshold: DEFAULT_LONG_TAIL_THRESHOLD,
            max_link_step: u32::MAX,
        }
    }
}

/// Resumable position state for [`SkeyWriter::seek_target_skey`].
///
/// A cursor only ever moves forward; repeated seeks with increasing targets
/// amortize to roughly O(sqrt(n)) each instead of restarting from the list
/// head. Create one per pkey scan and keep it across calls.
#[derive(Debug, Clone)]
pub struct SeekCursor {
    block: u32,
    node: u32,
    exhausted: bool,
}

impl Default for SeekCursor {
    fn default() -> Self {
        Self {
            block: INVALID_OFFSET,
            node: INVALID_OFFSET,
            exhausted: false,
        }
    }
}

impl SeekCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the node the cursor is parked on, or `INVALID_OFFSET`.
    #[inline]
    pub fn node_offset(&self) -> u32 {
        self.node
    }

    /// `true` once the cursor has walked off the end of the list.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Append-only writer for every suffix-key list of one building segment.
///
/// Owns two pre-sized arenas — suffix-key nodes and skip-list blocks — plus
/// all per-pkey list mutation: ordered insert, in-place replace, tombstone
/// linking, lazy skip-list construction and block splitting. One writer
/// thread mutates; readers traverse concurrently through published offsets
/// (see [`NodeArena`] for the ordering contract).
///
/// Capacity exhaustion is the only failure and it is non-fatal: `is_full()`
/// flips, every mutating call starts refusing, and the owner seals the
/// segment for dump.
pub struct SkeyWriter<S: SuffixKey> {
    skey_arena: NodeArena<SkeyNode<S>>,
    block_arena: NodeArena<ListNode<S>>,
    long_tail_threshold: u32,
    min_block_capacity: u32,
    max_link_step: u32,
    /// Longest list seen so far, for segment metrics.
    max_skey_count: AtomicU32,
}

impl<S: SuffixKey> SkeyWriter<S> {
    /// Builds a writer with arenas sized from `options.reserve_bytes`.
    ///
    /// The suffix-key arena takes the budget at one node per
    /// `size_of::<SkeyNode<S>>()` bytes; the block arena is sized
    /// proportionally at one block per `min_block_capacity` nodes.
    ///
    /// # Returns
    /// - `Err(Status::ConfigError)` if the budget cannot hold a single node
    ///   or a threshold is zero.
    pub fn new(options: SkeyWriterOptions) -> Result<Self, Status> {
        if options.long_tail_threshold == 0 {
            return Err(Status::ConfigError(
                "long_tail_threshold must be non-zero".into(),
            ));
        }
        if options.max_link_step == 0 {
            return Err(Status::ConfigError("max_link_step must be non-zero".into()));
        }

        let skey_capacity = options.reserve_bytes / std::mem::size_of::<SkeyNode<S>>();
        if skey_capacity == 0 {
            return Err(Status::ConfigError(format!(
                "reserve_bytes {} cannot hold a single suffix-key node",
                options.reserve_bytes
            )));
        }

        let min_block_capacity = (options.long_tail_threshold as f64).sqrt().floor() as u32;
        let min_block_capacity = min_block_capacity.max(1);
        let block_capacity = skey_capacity / min_block_capacity as usize + 1;

        Ok(Self {
            skey_arena: NodeArena::with_capacity(skey_capacity),
            block_arena: NodeArena::with_capacity(block_capacity),
            long_tail_threshold: options.long_tail_threshold,
            min_block_capacity,
            max_link_step: options.max_link_step,
            max_skey_count: AtomicU32::new(0),
        })
    }

    /// Appends an unlinked suffix-key node.
    ///
    /// O(1). The node is not reachable from any list until
    /// [`SkeyWriter::link_skey_node`] splices it in.
    ///
    /// # Returns
    /// - `Some(offset)`: The node's stable arena offset.
    /// - `None`: The arena is full — check [`SkeyWriter::is_full`] first.
    #[inline]
    pub fn append(
        &self,
        skey: S,
        timestamp: u32,
        expire_time: u32,
        value_offset: u64,
    ) -> Option<u32> {
        self.skey_arena
            .append(SkeyNode::new(skey, timestamp, expire_time, value_offset))
    }

    /// `true` once either arena has used its whole reserve.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.skey_arena.is_full() || self.block_arena.is_full()
    }

    /// Longest suffix-key list this writer has produced.
    #[inline]
    pub fn max_skey_count(&self) -> u32 {
        self.max_skey_count.load(Ordering::Relaxed)
    }

    /// Read access for iterators.
    #[inline]
    pub(crate) fn skey_node(&self, offset: u32) -> &SkeyNode<S> {
        self.skey_arena.get(offset)
    }

    /// Links the appended node at `skey_offset` into `info`'s list.
    ///
    /// This is the core mutation. Behavior by node kind:
    /// - **Whole-pkey tombstone**: resets `info` so the tombstone is the
    ///   entire list; all earlier nodes become unreachable.
    /// - **Existing suffix key** (insert or tombstone alike): spliced into
    ///   the old node's exact list position; `count` unchanged; a block head
    ///   pointing at the old node is repointed.
    /// - **New suffix key**: ordered insert after its predecessor, block
    ///   counters maintained, block split / skip-list creation as the sizing
    ///   heuristics demand. Refused without error once `max_link_step` is
    ///   reached.
    ///
    /// # Returns
    /// - `true`: Handled (including the `max_link_step` ignore case).
    /// - `false`: An arena is full — seal and dump.
    pub fn link_skey_node(&self, info: &SkeyListInfo, skey_offset: u32) -> bool {
        if self.is_full() {
            return false;
        }

        let node = self.skey_arena.get(skey_offset);
        if node.is_pkey_deleted() {
            info.reset_for_pkey_delete(skey_offset);
            return true;
        }
        let target = node.skey;

        if info.skey_header() == INVALID_OFFSET {
            return self.add_new_skey_node(info, skey_offset, None, None);
        }

        // Block-chain descent: last block whose min key is <= target. The
        // first block also covers targets below every block min (the insert
        // repoints its head).
        let mut covering_block = None;
        let mut scan_head = info.skey_header();
        let block_header = info.block_header();
        if block_header != INVALID_OFFSET {
            let mut current = block_header;
            loop {
                let block = self.block_arena.get(current);
                let next = block.next();
                if next == INVALID_OFFSET {
                    break;
                }
                if self.block_arena.get(next).min_skey() <= target {
                    current = next;
                } else {
                    break;
                }
            }
            covering_block = Some(current);
            scan_head = self.block_arena.get(current).skey_offset();
        }

        // Linear scan of the guarded run. The run is short by construction
        // (near sqrt of the list length), and the next run's head key is
        // > target, so the scan terminates inside this run.
        let mut prev = None;
        let mut current = scan_head;
        let mut last_seen: Option<S> = None;
        while current != INVALID_OFFSET {
            let candidate = self.skey_arena.get(current);

            // A whole-pkey tombstone stays parked at the head of the list it
            // reset; its skey field carries no meaning, so it can never be a
            // replace target or an ordering boundary.
            if candidate.is_pkey_deleted() {
                prev = Some(current);
                current = candidate.next();
                continue;
            }

            debug_assert!(
                last_seen.is_none_or(|p| p < candidate.skey),
                "suffix-key list must stay strictly ascending"
            );

            if candidate.skey > target {
                break;
            }
            if candidate.skey == target {
                self.replace_skey_node(covering_block, prev, current, skey_offset, info);
                return true;
            }

            last_seen = Some(candidate.skey);
            prev = Some(current);
            current = candidate.next();
        }

        self.add_new_skey_node(info, skey_offset, prev, covering_block)
    }

    /// Ordered insert of a brand-new suffix key.
    fn add_new_skey_node(
        &self,
        info: &SkeyListInfo,
        new_offset: u32,
        prev: Option<u32>,
        covering_block: Option<u32>,
    ) -> bool {
        let count = info.count();
        if count >= self.max_link_step {
            warn!(
                count,
                max_link_step = self.max_link_step,
                "suffix-key protection threshold reached, ignoring new suffix key"
            );
            return true;
        }

        let new_node = self.skey_arena.get(new_offset);
        match prev {
            Some(prev_offset) => {
                let prev_node = self.skey_arena.get(prev_offset);
                new_node.set_next(prev_node.next());
                prev_node.set_next(new_offset);
            }
            None => {
                new_node.set_next(info.skey_header());
                info.set_skey_header(new_offset);
            }
        }

        let new_count = info.increment_count();
        self.max_skey_count.fetch_max(new_count, Ordering::Relaxed);

        if let Some(block_offset) = covering_block {
            let block = self.block_arena.get(block_offset);
            if prev.is_none() {
                // Head insert: the covering block now starts at the new node.
                block.set_skey_offset(new_offset);
                block.set_min_skey(new_node.skey);
            }
            let block_count = block.increment_count();
            if (block_count as u64) * (block_count as u64) > 4 * new_count as u64 {
                self.split_list_node(block_offset);
            }
        } else if new_count >= self.long_tail_threshold && info.block_header() == INVALID_OFFSET {
            self.create_list(info);
        }

        true
    }

    /// Splices `new_offset` into the exact position of `old_offset`.
    ///
    /// The old node is abandoned in place — still allocated, no longer
    /// reachable. `count` is unchanged: replacing never grows the list.
    fn replace_skey_node(
        &self,
        covering_block: Option<u32>,
        prev: Option<u32>,
        old_offset: u32,
        new_offset: u32,
        info: &SkeyListInfo,
    ) {
        let old_node = self.skey_arena.get(old_offset);
        let new_node = self.skey_arena.get(new_offset);

        new_node.set_next(old_node.next());
        match prev {
            Some(prev_offset) => self.skey_arena.get(prev_offset).set_next(new_offset),
            None => info.set_skey_header(new_offset),
        }

        if let Some(block_offset) = covering_block {
            let block = self.block_arena.get(block_offset);
            if block.skey_offset() == old_offset {
                block.set_skey_offset(new_offset);
            }
        }
    }

    /// Splits an oversized block into two near-halves.
    ///
    /// Skipped silently when the block arena is exhausted; the run merely
    /// stays longer than the heuristic wants until the segment rotates.
    fn split_list_node(&self, block_offset: u32) {
        if self.block_arena.is_full() {
            return;
        }

        let block = self.block_arena.get(block_offset);
        let total = block.count();
        if total < 2 {
            return;
        }
        let keep = total / 2;

        let mut split_at = block.skey_offset();
        for _ in 0..keep {
            split_at = self.skey_arena.get(split_at).next();
        }

        let split_node = self.skey_arena.get(split_at);
        let Some(new_offset) = self
            .block_arena
            .append(ListNode::new(split_node.skey, split_at, total - keep))
        else {
            return;
        };

        // Chain the new block in before it becomes reachable.
        self.block_arena.get(new_offset).set_next(block.next());
        block.set_count(keep);
        block.set_next(new_offset);
    }

    /// Eagerly partitions a long flat list into blocks of
    /// `min_block_capacity`, then publishes the chain.
    ///
    /// Runs once per pkey, when `count` first reaches the long-tail
    /// threshold. If the block arena cannot hold the whole partition the
    /// list stays flat and the next insert retries.
    fn create_list(&self, info: &SkeyListInfo) {
        let capacity = self.min_block_capacity;
        let needed = info.count().div_ceil(capacity) as usize;
        if self.block_arena.remaining() < needed {
            return;
        }

        let mut chain_head = INVALID_OFFSET;
        let mut chain_tail: Option<u32> = None;
        let mut current = info.skey_header();

        while current != INVALID_OFFSET {
            let run_head = current;
            let min_skey = self.skey_arena.get(run_head).skey;

            let mut run_len = 0u32;
            while current != INVALID_OFFSET && run_len < capacity {
                current = self.skey_arena.get(current).next();
                run_len += 1;
            }

            let Some(block_offset) = self
                .block_arena
                .append(ListNode::new(min_skey, run_head, run_len))
            else {
                // Capacity was checked above; bail out and leave the list
                // flat rather than publish a partial chain.
                return;
            };

            match chain_tail {
                Some(tail) => self.block_arena.get(tail).set_next(block_offset),
                None => chain_head = block_offset,
            }
            chain_tail = Some(block_offset);
        }

        info.set_block_header(chain_head);
    }

    /// Resumable forward-only point lookup.
    ///
    /// Designed for repeated, increasing targets: the block cursor advances
    /// while the next block's min key is `<= target`, then a linear scan
    /// runs from the best candidate. The cursor never rewinds.
    ///
    /// # Returns
    /// - `Some(offset)`: Exact live match; the cursor stays parked on it.
    /// - `None`: No live match. The cursor is parked on the first key
    ///   `> target` (or on the target's tombstone, or exhausted).
    pub fn seek_target_skey(
        &self,
        info: &SkeyListInfo,
        target: S,
        cursor: &mut SeekCursor,
    ) -> Option<u32> {
        if cursor.exhausted {
            return None;
        }

        if cursor.node == INVALID_OFFSET {
            cursor.node = info.skey_header();
            cursor.block = info.block_header();
            if cursor.node == INVALID_OFFSET {
                cursor.exhausted = true;
                return None;
            }
        }

        if cursor.block != INVALID_OFFSET {
            let mut advanced = false;
            loop {
                let block = self.block_arena.get(cursor.block);
                let next = block.next();
                if next == INVALID_OFFSET {
                    break;
                }
                if self.block_arena.get(next).min_skey() <= target {
                    cursor.block = next;
                    advanced = true;
                } else {
                    break;
                }
            }
            if advanced {
                cursor.node = self.block_arena.get(cursor.block).skey_offset();
            }
        }

        while cursor.node != INVALID_OFFSET {
            let node = self.skey_arena.get(cursor.node);

            if node.is_pkey_deleted() {
                cursor.node = node.next();
                continue;
            }
            if node.skey > target {
                return None;
            }
            if node.skey == target {
                if node.is_skey_deleted() {
                    return None;
                }
                return Some(cursor.node);
            }

            cursor.node = node.next();
        }

        cursor.exhausted = true;
        None
    }
}

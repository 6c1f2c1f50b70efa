use std::sync::Arc;
use std::sync::OnceLock;

use dashmap::DashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::kkv_engine::digest::Xxh3BuildHasher;
use crate::kkv_engine::skey_node::SkeyListInfo;

/// Prefix-key table: pkey hash → suffix-key list descriptor.
///
/// The engine consumes this as an interface; two policies ship with the
/// crate. Both are capacity-bounded at construction (the table participates
/// in the segment's memory budget) and follow the segment's concurrency
/// contract: one writer inserts, any number of readers look up concurrently.
pub trait PkeyTable: Send + Sync {
    /// Looks up the list descriptor for a prefix key.
    fn get(&self, pkey_hash: u64) -> Option<Arc<SkeyListInfo>>;

    /// Inserts a descriptor for a prefix key seen for the first time.
    ///
    /// # Returns
    /// - `true`: Inserted, or the key was already present (no-op).
    /// - `false`: The table is at capacity; nothing was stored.
    fn insert(&self, pkey_hash: u64, info: Arc<SkeyListInfo>) -> bool;

    /// `true` once the configured capacity is reached — a seal/dump trigger.
    fn is_full(&self) -> bool;

    /// Number of distinct prefix keys stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every `(pkey_hash, descriptor)` pair, in no particular order.
    /// Callers that need pkey order sort the collected pairs themselves.
    fn for_each(&self, visit: &mut dyn FnMut(u64, &Arc<SkeyListInfo>));
}

/// Separate-chaining policy: a sharded concurrent hash map keyed by the
/// already-uniform pkey hash (pass-through XXH3 hasher).
///
/// The default choice — grows gracefully toward its capacity bound and takes
/// no space for unused slots.
pub struct ChainedPkeyTable {
    map: DashMap<u64, Arc<SkeyListInfo>, Xxh3BuildHasher>,
    capacity: usize,
}

impl ChainedPkeyTable {
    /// # Parameters
    /// - `capacity`: Maximum number of distinct prefix keys; derived from
    ///   the pkey share of the segment memory budget.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: DashMap::with_capacity_and_hasher(capacity, Xxh3BuildHasher),
            capacity,
        }
    }
}

impl PkeyTable for ChainedPkeyTable {
    fn get(&self, pkey_hash: u64) -> Option<Arc<SkeyListInfo>> {
        self.map.get(&pkey_hash).map(|entry| Arc::clone(entry.value()))
    }

    fn insert(&self, pkey_hash: u64, info: Arc<SkeyListInfo>) -> bool {
        if self.is_full() && !self.map.contains_key(&pkey_hash) {
            return false;
        }
        self.map.entry(pkey_hash).or_insert(info);
        true
    }

    fn is_full(&self) -> bool {
        self.map.len() >= self.capacity
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn for_each(&self, visit: &mut dyn FnMut(u64, &Arc<SkeyListInfo>)) {
        for entry in self.map.iter() {
            visit(*entry.key(), entry.value());
        }
    }
}

/// Closed-hashing policy: fixed-capacity open addressing with linear
/// probing, one `OnceLock` slot per bucket.
///
/// Allocates its whole footprint up front (predictable memory, no rehash
/// pauses) and publishes each slot exactly once — `OnceLock` gives the
/// insert its release/acquire edge for free. Preferred for offline builds
/// where the pkey count estimate is reliable.
pub struct DensePkeyTable {
    slots: Box<[OnceLock<(u64, Arc<SkeyListInfo>)>]>,
    slot_mask: u64,
    max_entries: usize,
    len: std::sync::atomic::AtomicUsize,
}

impl DensePkeyTable {
    /// # Parameters
    /// - `capacity`: Maximum number of distinct prefix keys.
    /// - `load_factor`: Target occupancy, in `(0, 1)`; the slot array is the
    ///   next power of two above `capacity / load_factor`.
    pub fn with_capacity(capacity: usize, load_factor: f64) -> Self {
        let capacity = capacity.max(1);
        let load_factor = load_factor.clamp(0.1, 0.9);
        let needed = (capacity as f64 / load_factor).ceil() as usize;
        let slot_count = needed.next_power_of_two();

        let slots: Box<[OnceLock<(u64, Arc<SkeyListInfo>)>]> =
            (0..slot_count).map(|_| OnceLock::new()).collect();

        Self {
            slots,
            slot_mask: slot_count as u64 - 1,
            // Keep at least one slot free so a probe for an absent key
            // always terminates.
            max_entries: capacity.min(slot_count - 1),
            len: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    #[inline]
    fn probe_start(&self, pkey_hash: u64) -> u64 {
        // Remix before probing: pkey hashes are uniform, but remixing keeps
        // clustering down when producers feed sequential synthetic hashes.
        xxh3_64(&pkey_hash.to_le_bytes()) & self.slot_mask
    }
}

impl PkeyTable for DensePkeyTable {
    fn get(&self, pkey_hash: u64) -> Option<Arc<SkeyListInfo>> {
        let mut index = self.probe_start(pkey_hash);
        loop {
            match self.slots[index as usize].get() {
                None => return None,
                Some((stored, info)) if *stored == pkey_hash => {
                    return Some(Arc::clone(info));
                }
                Some(_) => index = (index + 1) & self.slot_mask,
            }
        }
    }

    fn insert(&self, pkey_hash: u64, info: Arc<SkeyListInfo>) -> bool {
        let mut index = self.probe_start(pkey_hash);
        loop {
            let slot = &self.slots[index as usize];
            match slot.get() {
                None => {
                    if self.is_full() {
                        return false;
                    }
                    if slot.set((pkey_hash, info.clone())).is_ok() {
                        self.len
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        return true;
                    }
                    // Raced by another writer — forbidden by the contract,
                    // but re-inspect the slot rather than spin forever.
                }
                Some((stored, _)) if *stored == pkey_hash => return true,
                Some(_) => index = (index + 1) & self.slot_mask,
            }
        }
    }

    fn is_full(&self) -> bool {
        self.len.load(std::sync::atomic::Ordering::Relaxed) >= self.max_entries
    }

    fn len(&self) -> usize {
        self.len.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn for_each(&self, visit: &mut dyn FnMut(u64, &Arc<SkeyListInfo>)) {
        for slot in self.slots.iter() {
            if let Some((pkey_hash, info)) = slot.get() {
                visit(*pkey_hash, info);
            }
        }
    }
}

/// Null sentinel for arena offsets (`next` pointers, list heads).
pub const INVALID_OFFSET: u32 = u32::MAX;

/// Value-offset sentinel marking a single-suffix-key delete tombstone.
pub const INVALID_VALUE_OFFSET: u64 = u64::MAX;

/// Value-offset sentinel marking a whole-prefix-key delete tombstone.
///
/// A node carrying this offset resets the entire suffix-key list: everything
/// linked before it becomes unreachable (but is never reclaimed — the arena
/// is append-only and discarded wholesale with the segment).
pub const SKEY_ALL_DELETED_OFFSET: u64 = u64::MAX - 1;

/// Expire time stored on records without a TTL ("never expires").
pub const UNINITIALIZED_EXPIRE_TIME: u32 = u32::MAX;

/// Suffix-key list length at which the per-pkey skip list is built.
pub const DEFAULT_LONG_TAIL_THRESHOLD: u32 = 100;

/// Hard ceiling on a single encoded value, 4 MiB.
pub const DEFAULT_MAX_VALUE_LEN: usize = 4 * 1024 * 1024;

/// Share of the build memory budget reserved for the prefix-key table.
pub const DEFAULT_PKEY_MEMORY_RATIO: f64 = 0.1;

/// Share of the build memory budget reserved for the value arena.
/// The suffix-key arenas get whatever remains after pkey + value shares.
pub const DEFAULT_VALUE_MEMORY_RATIO: f64 = 0.6;

/// Target load factor for the closed-hashing prefix-key table.
pub const DEFAULT_PKEY_LOAD_FACTOR: f64 = 0.7;

/// Estimated per-entry footprint of a prefix-key table slot (key, shared
/// descriptor, map overhead). Used to turn a byte budget into a capacity.
pub const PKEY_TABLE_ENTRY_BYTES: usize = 64;

/// Merge progress is logged every this many prefix keys.
pub const MERGE_PROGRESS_LOG_INTERVAL: u64 = 100_000;

/// Merge progress ratio is refreshed every this many prefix keys.
pub const MERGE_PROGRESS_RATIO_INTERVAL: u64 = 1_000;

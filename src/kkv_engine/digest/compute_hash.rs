use xxhash_rust::xxh3::xxh3_64;

/// Computes the 64-bit XXH3 hash of a raw prefix key.
///
/// Prefix keys enter the engine pre-hashed (`pkey_hash: u64`); this is the
/// hash function producers are expected to use, and what the tests use to
/// derive prefix-key hashes from human-readable keys.
///
/// # Parameters
/// - `key`: A byte slice representing the raw prefix key.
///
/// # Returns
/// - A `u64` hash value derived from the input key.
#[inline]
pub fn compute_hash(key: &[u8]) -> u64 {
    xxh3_64(key)
}

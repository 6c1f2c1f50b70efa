use crc32fast::Hasher as Crc32FastHasher;

/// Computes the 4-byte CRC32C checksum guarding one segment-file record.
///
/// Uses SSE4.2 on x86_64 and NEON on ARM when available. The checksum covers
/// the record body only, not the fixed-size framing around it.
///
/// # Parameters
/// - `data`: The record body to checksum.
///
/// # Returns
/// - The checksum as a little-endian 4-byte array.
#[inline]
pub fn compute_checksum(data: &[u8]) -> [u8; 4] {
    let mut hasher = Crc32FastHasher::new();
    hasher.update(data);
    hasher.finalize().to_le_bytes()
}

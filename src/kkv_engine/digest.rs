mod compute_checksum;
pub use compute_checksum::compute_checksum;

mod compute_hash;
pub use compute_hash::compute_hash;

mod xxh3_build_hasher;
pub use xxh3_build_hasher::{Xxh3BuildHasher, Xxh3Hasher};

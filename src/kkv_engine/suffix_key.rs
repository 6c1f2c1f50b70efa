mod sealed {
    pub trait Sealed {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// Suffix-key type parameter for the whole engine.
///
/// The engine is generic over a small closed set of integer widths rather
/// than arbitrary key types: skip-list blocks store the key widened to `u64`
/// in an atomic, and segment files encode it in `WIDTH` little-endian bytes.
/// The trait is sealed; `u32` and `u64` are the supported widths.
pub trait SuffixKey:
    sealed::Sealed + Copy + Ord + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static
{
    /// Encoded byte width in segment files.
    const WIDTH: usize;

    /// Widens the key for atomic skip-list block storage.
    fn to_raw(self) -> u64;

    /// Inverse of [`SuffixKey::to_raw`]. Values produced by `to_raw` always
    /// round-trip; anything else is a caller bug.
    fn from_raw(raw: u64) -> Self;
}

impl SuffixKey for u32 {
    const WIDTH: usize = 4;

    #[inline]
    fn to_raw(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        raw as u32
    }
}

impl SuffixKey for u64 {
    const WIDTH: usize = 8;

    #[inline]
    fn to_raw(self) -> u64 {
        self
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        raw
    }
}

use std::ops::Range;
use std::sync::Arc;

use memmap2::Mmap;

/// Zero-copy owner of one value's bytes inside a mapped segment file.
///
/// Holding the `Arc<Mmap>` keeps the mapping alive for as long as any
/// handle to it exists, so merge inputs can pass values straight from the
/// source segments to the sink without copying.
#[derive(Debug, Clone)]
pub struct ValueHandle {
    mmap: Arc<Mmap>,
    range: Range<usize>,
}

impl ValueHandle {
    pub(crate) fn new(mmap: Arc<Mmap>, range: Range<usize>) -> Self {
        Self { mmap, range }
    }

    /// The value bytes, referencing the mapped file directly.
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Enable `*handle` to act like a `&[u8]`.
impl std::ops::Deref for ValueHandle {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

/// Let tests do `assert_eq!(handle, b"bytes")`.
impl PartialEq<[u8]> for ValueHandle {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl PartialEq<&[u8]> for ValueHandle {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_slice() == *other
    }
}

impl PartialEq<Vec<u8>> for ValueHandle {
    fn eq(&self, other: &Vec<u8>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

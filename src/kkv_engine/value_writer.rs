use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::kkv_engine::status::Status;

/// Append-only blob arena for document values.
///
/// The engine consumes this as an interface; [`ArenaValueWriter`] is the
/// in-memory implementation used by building segments. Offsets returned by
/// `append` are stable for the life of the segment.
pub trait ValueWriter: Send + Sync {
    /// Appends one value blob.
    ///
    /// # Returns
    /// - `Ok(offset)`: Stable offset to hand to the suffix-key node.
    /// - `Err(Status::NeedDump)`: The blob does not fit in the remaining
    ///   reserve; nothing was written.
    fn append(&self, bytes: &[u8]) -> Result<u64, Status>;

    /// Reads back the blob at `offset`. `None` for offsets that were never
    /// returned by [`ValueWriter::append`].
    fn get(&self, offset: u64) -> Option<&[u8]>;

    /// Bytes consumed so far, framing included.
    fn used_bytes(&self) -> usize;

    /// Total byte reserve fixed at construction.
    fn reserve_bytes(&self) -> usize;

    fn remaining_bytes(&self) -> usize {
        self.reserve_bytes() - self.used_bytes()
    }
}

/// Fixed-reserve value arena: `[len: u32 LE][payload]` frames appended one
/// after another in a pre-allocated buffer.
///
/// Follows the building segment's single-writer/many-reader contract: the
/// writer appends and publishes the new watermark with a `Release` store;
/// readers only dereference offsets obtained from published suffix-key
/// nodes, so an `Acquire` on the watermark (or on the node link that carried
/// the offset) makes the frame bytes visible.
pub struct ArenaValueWriter {
    buf: Box<[UnsafeCell<u8>]>,
    used: AtomicUsize,
}

// SAFETY: byte regions are written exactly once, before the watermark (or a
// node link naming the offset) publishes them with Release; readers never
// touch bytes past the acquired watermark.
unsafe impl Sync for ArenaValueWriter {}
unsafe impl Send for ArenaValueWriter {}

const VALUE_FRAME_HEADER: usize = 4;

impl ArenaValueWriter {
    /// Creates an arena holding at most `reserve_bytes` of framed values.
    pub fn with_reserve(reserve_bytes: usize) -> Self {
        let buf: Box<[UnsafeCell<u8>]> = (0..reserve_bytes).map(|_| UnsafeCell::new(0)).collect();
        Self {
            buf,
            used: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn base_ptr(&self) -> *mut u8 {
        // UnsafeCell<u8> is repr(transparent); the slot array is one
        // contiguous byte region.
        self.buf.as_ptr() as *mut u8
    }
}

impl ValueWriter for ArenaValueWriter {
    fn append(&self, bytes: &[u8]) -> Result<u64, Status> {
        let start = self.used.load(Ordering::Relaxed);
        let frame_len = VALUE_FRAME_HEADER + bytes.len();
        if start + frame_len > self.buf.len() {
            return Err(Status::NeedDump);
        }

        let header = (bytes.len() as u32).to_le_bytes();
        // SAFETY: the region [start, start + frame_len) is above the
        // published watermark, so no reader can observe it yet; the
        // single-writer contract rules out concurrent appends.
        unsafe {
            let dst = self.base_ptr().add(start);
            std::ptr::copy_nonoverlapping(header.as_ptr(), dst, VALUE_FRAME_HEADER);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.add(VALUE_FRAME_HEADER), bytes.len());
        }

        self.used.store(start + frame_len, Ordering::Release);
        Ok(start as u64)
    }

    fn get(&self, offset: u64) -> Option<&[u8]> {
        let used = self.used.load(Ordering::Acquire);
        let start = offset as usize;
        if start + VALUE_FRAME_HEADER > used {
            return None;
        }

        // SAFETY: everything below the acquired watermark is fully written
        // and immutable from here on.
        unsafe {
            let base = self.base_ptr() as *const u8;
            let mut header = [0u8; VALUE_FRAME_HEADER];
            std::ptr::copy_nonoverlapping(base.add(start), header.as_mut_ptr(), VALUE_FRAME_HEADER);
            let len = u32::from_le_bytes(header) as usize;
            if start + VALUE_FRAME_HEADER + len > used {
                return None;
            }
            Some(std::slice::from_raw_parts(
                base.add(start + VALUE_FRAME_HEADER),
                len,
            ))
        }
    }

    fn used_bytes(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    fn reserve_bytes(&self) -> usize {
        self.buf.len()
    }
}

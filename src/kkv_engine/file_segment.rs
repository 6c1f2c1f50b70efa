//! Reference file-backed segment codec.
//!
//! The production pkey/skey/value file codec lives outside this crate; this
//! module is the compact stand-in that makes dump → reload → merge round
//! trips possible with nothing but the crate itself: one flat record file
//! per segment, CRC32C per record, a fixed-size footer carrying the
//! aggregate stats, zero-copy `memmap2` read-back.

mod footer;
pub use footer::SegmentFooter;

mod sink;
pub use sink::FileSegmentSink;

mod reader;
pub use reader::{FileSegmentReader, SegmentRecord, SegmentRecordIter};

mod set_iterator;
pub use set_iterator::SegmentSetIterator;

mod value_handle;
pub use value_handle::ValueHandle;

/// Name of the record file inside a segment directory.
pub const SEGMENT_FILE_NAME: &str = "segment.kkv";

/// ASCII "KKVS".
pub(crate) const SEGMENT_MAGIC: u32 = 0x4B4B_5653;
pub(crate) const SEGMENT_VERSION: u32 = 1;

/// File header: magic + version.
pub(crate) const HEADER_SIZE: usize = 8;

/// Per-record checksum width.
pub(crate) const RECORD_CHECKSUM_SIZE: usize = 4;

pub(crate) const FLAG_PKEY_DELETED: u8 = 0b0000_0001;
pub(crate) const FLAG_SKEY_DELETED: u8 = 0b0000_0010;
pub(crate) const FLAG_LAST_NODE: u8 = 0b0000_0100;

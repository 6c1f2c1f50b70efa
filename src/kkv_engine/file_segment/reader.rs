use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use super::footer::{FOOTER_SIZE, SegmentFooter};
use super::value_handle::ValueHandle;
use super::{
    FLAG_LAST_NODE, FLAG_PKEY_DELETED, FLAG_SKEY_DELETED, HEADER_SIZE, RECORD_CHECKSUM_SIZE,
    SEGMENT_FILE_NAME, SEGMENT_MAGIC,
};
use crate::kkv_engine::digest::compute_checksum;
use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;

/// One decoded record of a reference segment file.
#[derive(Debug, Clone)]
pub struct SegmentRecord<S> {
    pub pkey_hash: u64,
    pub is_pkey_deleted: bool,
    pub is_skey_deleted: bool,
    pub is_last_node: bool,
    pub skey: S,
    pub timestamp: u32,
    pub expire_time: u32,
    /// `None` on tombstone records of either kind.
    pub value: Option<ValueHandle>,
}

/// Zero-copy reader over one reference segment file.
///
/// Maps the file once; every record and value handed out references the
/// mapping directly. Footer and per-record checksums are verified, so a
/// truncated or bit-flipped file surfaces as [`Status::Corruption`] instead
/// of bad data.
pub struct FileSegmentReader<S> {
    mmap: Arc<Mmap>,
    footer: SegmentFooter,
    _marker: PhantomData<S>,
}

impl<S: SuffixKey> FileSegmentReader<S> {
    pub fn open(directory: &Path) -> Result<Self, Status> {
        let path = directory.join(SEGMENT_FILE_NAME);
        let file = File::open(&path)?;

        // SAFETY: segment files are immutable once closed; nothing truncates
        // or rewrites them while a reader holds the mapping.
        let mmap = unsafe { memmap2::MmapOptions::new().map(&file)? };

        if mmap.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(Status::Corruption(format!(
                "segment file {} is too short ({} bytes)",
                path.display(),
                mmap.len()
            )));
        }

        let magic = u32::from_le_bytes(mmap[0..4].try_into().unwrap_or_default());
        if magic != SEGMENT_MAGIC {
            return Err(Status::Corruption(format!(
                "segment file {} has a bad header magic",
                path.display()
            )));
        }

        let footer = SegmentFooter::read_from(&mmap).ok_or_else(|| {
            Status::Corruption(format!(
                "segment file {} has no valid footer",
                path.display()
            ))
        })?;

        Ok(Self {
            mmap: Arc::new(mmap),
            footer,
            _marker: PhantomData,
        })
    }

    pub fn footer(&self) -> &SegmentFooter {
        &self.footer
    }

    /// Forward iterator over every record in file order (ascending pkey,
    /// per-pkey records ascending, tombstone first).
    pub fn records(&self) -> SegmentRecordIter<S> {
        SegmentRecordIter {
            mmap: Arc::clone(&self.mmap),
            cursor: HEADER_SIZE,
            remaining: self.footer.record_count,
            _marker: PhantomData,
        }
    }
}

pub struct SegmentRecordIter<S> {
    mmap: Arc<Mmap>,
    cursor: usize,
    remaining: u64,
    _marker: PhantomData<S>,
}

impl<S: SuffixKey> SegmentRecordIter<S> {
    fn parse_next(&mut self) -> Result<SegmentRecord<S>, Status> {
        // Fixed part of the body: pkey + flags + skey + ts + expire + vlen.
        let fixed = 8 + 1 + S::WIDTH + 4 + 4 + 4;
        let body_limit = self.mmap.len() - FOOTER_SIZE;

        if self.cursor + fixed > body_limit {
            return Err(Status::Corruption(format!(
                "record truncated at offset {}",
                self.cursor
            )));
        }

        let base = self.cursor;
        let bytes = &self.mmap[base..];

        let pkey_hash = u64::from_le_bytes(bytes[0..8].try_into().unwrap_or_default());
        let flags = bytes[8];

        let mut skey_raw = [0u8; 8];
        skey_raw[..S::WIDTH].copy_from_slice(&bytes[9..9 + S::WIDTH]);
        let skey = S::from_raw(u64::from_le_bytes(skey_raw));

        let after_skey = 9 + S::WIDTH;
        let timestamp =
            u32::from_le_bytes(bytes[after_skey..after_skey + 4].try_into().unwrap_or_default());
        let expire_time = u32::from_le_bytes(
            bytes[after_skey + 4..after_skey + 8]
                .try_into()
                .unwrap_or_default(),
        );
        let value_len = u32::from_le_bytes(
            bytes[after_skey + 8..after_skey + 12]
                .try_into()
                .unwrap_or_default(),
        ) as usize;

        let body_len = fixed + value_len;
        if base + body_len + RECORD_CHECKSUM_SIZE > body_limit {
            return Err(Status::Corruption(format!(
                "record value truncated at offset {base}"
            )));
        }

        let stored: [u8; RECORD_CHECKSUM_SIZE] = self.mmap
            [base + body_len..base + body_len + RECORD_CHECKSUM_SIZE]
            .try_into()
            .unwrap_or_default();
        if compute_checksum(&self.mmap[base..base + body_len]) != stored {
            return Err(Status::Corruption(format!(
                "record checksum mismatch at offset {base}"
            )));
        }

        let is_pkey_deleted = flags & FLAG_PKEY_DELETED != 0;
        let is_skey_deleted = flags & FLAG_SKEY_DELETED != 0;
        let value = (!is_pkey_deleted && !is_skey_deleted).then(|| {
            ValueHandle::new(
                Arc::clone(&self.mmap),
                base + fixed..base + fixed + value_len,
            )
        });

        self.cursor = base + body_len + RECORD_CHECKSUM_SIZE;

        Ok(SegmentRecord {
            pkey_hash,
            is_pkey_deleted,
            is_skey_deleted,
            is_last_node: flags & FLAG_LAST_NODE != 0,
            skey,
            timestamp,
            expire_time,
            value,
        })
    }
}

impl<S: SuffixKey> Iterator for SegmentRecordIter<S> {
    type Item = Result<SegmentRecord<S>, Status>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let record = self.parse_next();
        if record.is_err() {
            // Poison the iterator: after a corrupt record the cursor can
            // no longer be trusted.
            self.remaining = 0;
        }
        Some(record)
    }
}

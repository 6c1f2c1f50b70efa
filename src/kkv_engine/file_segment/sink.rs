use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use tracing::debug;

use super::footer::SegmentFooter;
use super::{FLAG_LAST_NODE, FLAG_PKEY_DELETED, FLAG_SKEY_DELETED, SEGMENT_FILE_NAME, SEGMENT_MAGIC, SEGMENT_VERSION};
use crate::kkv_engine::digest::compute_checksum;
use crate::kkv_engine::dump_sink::{DumpLayoutHint, DumpSink, SinkDoc};
use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;

/// Reference [`DumpSink`]: one flat record file per segment directory.
///
/// Record layout, little-endian, CRC32C over the body appended after it:
/// `[pkey u64][flags u8][skey S::WIDTH][timestamp u32][expire u32]
/// [value_len u32][value][crc u32]`.
///
/// Aggregate stats are tracked while writing and persisted into the footer
/// on `close`; the post-hoc accessors serve them to merge metric filling.
pub struct FileSegmentSink<S> {
    writer: Option<BufWriter<File>>,
    record_buf: Vec<u8>,
    record_count: u64,
    pkey_count: u64,
    skey_count: u64,
    max_value_len: usize,
    max_skey_count: u32,
    current_pkey: Option<u64>,
    current_pkey_skeys: u32,
    _marker: PhantomData<S>,
}

impl<S> FileSegmentSink<S> {
    pub fn new() -> Self {
        Self {
            writer: None,
            record_buf: Vec::new(),
            record_count: 0,
            pkey_count: 0,
            skey_count: 0,
            max_value_len: 0,
            max_skey_count: 0,
            current_pkey: None,
            current_pkey_skeys: 0,
            _marker: PhantomData,
        }
    }
}

impl<S> Default for FileSegmentSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SuffixKey> DumpSink<S> for FileSegmentSink<S> {
    fn init(&mut self, directory: &Path, hint: &DumpLayoutHint) -> Result<(), Status> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(SEGMENT_FILE_NAME);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(&SEGMENT_MAGIC.to_le_bytes())?;
        writer.write_all(&SEGMENT_VERSION.to_le_bytes())?;

        debug!(
            path = %path.display(),
            estimated_pkeys = hint.estimated_pkey_count,
            estimated_skeys = hint.estimated_skey_count,
            "segment sink opened"
        );

        self.writer = Some(writer);
        self.record_count = 0;
        self.pkey_count = 0;
        self.skey_count = 0;
        self.max_value_len = 0;
        self.max_skey_count = 0;
        self.current_pkey = None;
        self.current_pkey_skeys = 0;
        Ok(())
    }

    fn dump(
        &mut self,
        pkey_hash: u64,
        is_deleted_pkey: bool,
        is_last_node: bool,
        doc: &SinkDoc<'_, S>,
    ) -> Result<(), Status> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(Status::InternalError("segment sink is not initialized".into()));
        };

        if self.current_pkey != Some(pkey_hash) {
            debug_assert!(
                self.current_pkey.is_none() || self.current_pkey < Some(pkey_hash),
                "prefix keys must arrive in ascending order"
            );
            self.current_pkey = Some(pkey_hash);
            self.current_pkey_skeys = 0;
            self.pkey_count += 1;
        }

        let mut flags = 0u8;
        if is_deleted_pkey {
            flags |= FLAG_PKEY_DELETED;
        }
        if doc.skey_deleted {
            flags |= FLAG_SKEY_DELETED;
        }
        if is_last_node {
            flags |= FLAG_LAST_NODE;
        }

        let value = doc.value.unwrap_or(&[]);

        let buf = &mut self.record_buf;
        buf.clear();
        buf.extend_from_slice(&pkey_hash.to_le_bytes());
        buf.push(flags);
        buf.extend_from_slice(&doc.skey.to_raw().to_le_bytes()[..S::WIDTH]);
        buf.extend_from_slice(&doc.timestamp.to_le_bytes());
        buf.extend_from_slice(&doc.expire_time.to_le_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(value);

        let checksum = compute_checksum(buf);
        writer.write_all(buf)?;
        writer.write_all(&checksum)?;

        self.record_count += 1;
        if !is_deleted_pkey {
            self.skey_count += 1;
            self.current_pkey_skeys += 1;
            self.max_skey_count = self.max_skey_count.max(self.current_pkey_skeys);
            if let Some(bytes) = doc.value {
                self.max_value_len = self.max_value_len.max(bytes.len());
            }
        }

        Ok(())
    }

    fn close(&mut self) -> Result<(), Status> {
        let Some(mut writer) = self.writer.take() else {
            return Err(Status::InternalError("segment sink is not initialized".into()));
        };

        SegmentFooter::write(
            &mut writer,
            self.record_count,
            self.pkey_count,
            self.skey_count,
            self.max_value_len as u64,
            self.max_skey_count,
        )?;
        writer.flush()?;
        Ok(())
    }

    fn pkey_count(&self) -> u64 {
        self.pkey_count
    }

    fn total_skey_count(&self) -> u64 {
        self.skey_count
    }

    fn max_skey_count(&self) -> u32 {
        self.max_skey_count
    }

    fn max_value_len(&self) -> usize {
        self.max_value_len
    }
}

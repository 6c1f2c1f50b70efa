use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::kkv_engine::config::{DumpMode, KkvIndexConfig};
use crate::kkv_engine::constants::UNINITIALIZED_EXPIRE_TIME;
use crate::kkv_engine::dump_sink::{DumpLayoutHint, DumpSink, SinkDoc};
use crate::kkv_engine::pkey_table::PkeyTable;
use crate::kkv_engine::record_filter::RecordFilter;
use crate::kkv_engine::skey_iterator::BuildingSkeyIterator;
use crate::kkv_engine::skey_node::SkeyListInfo;
use crate::kkv_engine::skey_writer::SkeyWriter;
use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;
use crate::kkv_engine::value_writer::ValueWriter;

/// Fixed per-record framing overhead of a dumped segment record, on top of
/// the suffix-key width and the value bytes:
/// pkey (8) + flags (1) + timestamp (4) + expire (4) + value length (4) +
/// record checksum (4).
const RECORD_FRAMING_BYTES: u64 = 8 + 1 + 4 + 4 + 4 + 4;

/// Segment file header + footer framing.
const SEGMENT_FRAMING_BYTES: u64 = 8 + 48;

/// Inputs to the dump size estimators — counts and ratios only, no live
/// structure access, so planners can call these before a segment exists.
#[derive(Debug, Clone)]
pub struct DumpEstimateInput {
    pub pkey_count: u64,
    pub skey_count: u64,
    pub value_bytes: u64,
    pub skey_width: usize,
    /// Expected compressed/uncompressed ratio of the value stream, in
    /// `(0, 1]`. `1.0` means no compression.
    pub value_compress_ratio: f64,
    /// Output chunk alignment, bytes; the estimate rounds up to it.
    pub chunk_align_bytes: u64,
}

/// Converts a sealed building segment into an on-disk segment through an
/// abstract sink.
///
/// The dumper never mutates the structures it reads; build-side writes must
/// have stopped before `dump` runs (sealed-snapshot contract). Prefix keys
/// are emitted in ascending hash order either way; the dump mode only
/// decides how long the live structure is held:
/// - [`DumpMode::Offline`]: sort, then stream each list straight out of the
///   arenas. Cheapest, used for build-service dumps.
/// - [`DumpMode::Online`]: materialize every record (values included) into
///   a transient buffer first, then emit from the copy — minimal hold time
///   for real-time segments, whose size cap bounds the buffer.
pub struct KkvIndexDumper<S: SuffixKey> {
    table: Arc<dyn PkeyTable>,
    writer: Arc<SkeyWriter<S>>,
    values: Arc<dyn ValueWriter>,
    config: KkvIndexConfig,
    filter: RecordFilter,
}

struct BufferedRecord<S> {
    skey: S,
    skey_deleted: bool,
    timestamp: u32,
    expire_time: u32,
    value: Option<Vec<u8>>,
}

struct BufferedPkey<S> {
    pkey_hash: u64,
    pkey_deleted_ts: Option<u32>,
    records: Vec<BufferedRecord<S>>,
}

impl<S: SuffixKey> KkvIndexDumper<S> {
    pub fn new(
        table: Arc<dyn PkeyTable>,
        writer: Arc<SkeyWriter<S>>,
        values: Arc<dyn ValueWriter>,
        config: KkvIndexConfig,
    ) -> Self {
        let filter = RecordFilter::from_config(&config);
        Self {
            table,
            writer,
            values,
            config,
            filter,
        }
    }

    /// Replaces the TTL filter (tests inject a fixed clock through this).
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Dumps every prefix key in ascending hash order.
    pub fn dump(&self, sink: &mut dyn DumpSink<S>, directory: &Path) -> Result<(), Status> {
        let mut pairs: Vec<(u64, Arc<SkeyListInfo>)> = Vec::with_capacity(self.table.len());
        self.table
            .for_each(&mut |pkey_hash, info| pairs.push((pkey_hash, Arc::clone(info))));
        pairs.sort_unstable_by_key(|(pkey_hash, _)| *pkey_hash);

        let hint = DumpLayoutHint {
            estimated_pkey_count: pairs.len() as u64,
            estimated_skey_count: pairs.iter().map(|(_, info)| info.count() as u64).sum(),
            estimated_value_bytes: self.values.used_bytes() as u64,
        };
        sink.init(directory, &hint)?;

        debug!(
            pkey_count = pairs.len(),
            mode = ?self.config.dump_mode,
            "dumping building segment"
        );

        match self.config.dump_mode {
            DumpMode::Offline => {
                for (pkey_hash, info) in &pairs {
                    self.dump_pkey_streaming(sink, *pkey_hash, info)?;
                }
            }
            DumpMode::Online => {
                let buffered: Vec<BufferedPkey<S>> = pairs
                    .iter()
                    .map(|(pkey_hash, info)| self.materialize_pkey(*pkey_hash, info))
                    .collect();
                for pkey in &buffered {
                    self.emit_buffered(sink, pkey)?;
                }
            }
        }

        sink.close()
    }

    /// Streams one prefix key's list straight out of the live arenas.
    fn dump_pkey_streaming(
        &self,
        sink: &mut dyn DumpSink<S>,
        pkey_hash: u64,
        info: &Arc<SkeyListInfo>,
    ) -> Result<(), Status> {
        let mut iter = BuildingSkeyIterator::new(Arc::clone(&self.writer), Arc::clone(info));

        let emit_tombstone = iter.has_pkey_deleted() && self.filter.keep(iter.pkey_deleted_ts());
        if emit_tombstone {
            let is_last = !iter.is_valid();
            let doc = SinkDoc {
                skey: S::from_raw(0),
                skey_deleted: false,
                timestamp: iter.pkey_deleted_ts(),
                expire_time: UNINITIALIZED_EXPIRE_TIME,
                value: None,
            };
            sink.dump(pkey_hash, true, is_last, &doc)?;
        }

        while iter.is_valid() {
            let skey = iter.skey();
            let skey_deleted = iter.is_deleted();
            let timestamp = iter.timestamp();
            let expire_time = iter.expire_time();
            let value_offset = iter.value_offset();

            iter.move_to_next();
            let is_last = !iter.is_valid();

            let value = if skey_deleted {
                None
            } else {
                match self.values.get(value_offset) {
                    Some(bytes) => Some(bytes),
                    None => {
                        return Err(Status::InternalError(format!(
                            "value offset {value_offset} of pkey {pkey_hash:#x} is unreadable"
                        )));
                    }
                }
            };

            let doc = SinkDoc {
                skey,
                skey_deleted,
                timestamp,
                expire_time,
                value,
            };
            sink.dump(pkey_hash, false, is_last, &doc)?;
        }

        Ok(())
    }

    /// Copies one prefix key's records (values included) out of the live
    /// structure, for the online dump path.
    fn materialize_pkey(&self, pkey_hash: u64, info: &Arc<SkeyListInfo>) -> BufferedPkey<S> {
        let mut iter = BuildingSkeyIterator::new(Arc::clone(&self.writer), Arc::clone(info));

        let pkey_deleted_ts = iter.has_pkey_deleted().then(|| iter.pkey_deleted_ts());
        let mut records = Vec::with_capacity(info.count() as usize);

        while iter.is_valid() {
            let skey_deleted = iter.is_deleted();
            let value = if skey_deleted {
                None
            } else {
                self.values.get(iter.value_offset()).map(<[u8]>::to_vec)
            };
            records.push(BufferedRecord {
                skey: iter.skey(),
                skey_deleted,
                timestamp: iter.timestamp(),
                expire_time: iter.expire_time(),
                value,
            });
            iter.move_to_next();
        }

        BufferedPkey {
            pkey_hash,
            pkey_deleted_ts,
            records,
        }
    }

    fn emit_buffered(
        &self,
        sink: &mut dyn DumpSink<S>,
        pkey: &BufferedPkey<S>,
    ) -> Result<(), Status> {
        let emit_tombstone = pkey
            .pkey_deleted_ts
            .is_some_and(|timestamp| self.filter.keep(timestamp));

        if let Some(timestamp) = pkey.pkey_deleted_ts {
            if emit_tombstone {
                let doc = SinkDoc {
                    skey: S::from_raw(0),
                    skey_deleted: false,
                    timestamp,
                    expire_time: UNINITIALIZED_EXPIRE_TIME,
                    value: None,
                };
                sink.dump(pkey.pkey_hash, true, pkey.records.is_empty(), &doc)?;
            }
        }

        let last_index = pkey.records.len().saturating_sub(1);
        for (index, record) in pkey.records.iter().enumerate() {
            let doc = SinkDoc {
                skey: record.skey,
                skey_deleted: record.skey_deleted,
                timestamp: record.timestamp,
                expire_time: record.expire_time,
                value: record.value.as_deref(),
            };
            sink.dump(pkey.pkey_hash, false, index == last_index, &doc)?;
        }

        Ok(())
    }

    /// Estimated byte size of the dumped segment file. Pure arithmetic —
    /// no I/O, no structure access.
    pub fn estimate_dump_file_size(input: &DumpEstimateInput) -> u64 {
        let record_bytes =
            input.skey_count * (RECORD_FRAMING_BYTES + input.skey_width as u64);
        let value_bytes =
            (input.value_bytes as f64 * input.value_compress_ratio.clamp(0.0, 1.0)) as u64;
        let raw = SEGMENT_FRAMING_BYTES + record_bytes + value_bytes;

        let align = input.chunk_align_bytes.max(1);
        raw.div_ceil(align) * align
    }

    /// Estimated transient memory of an online-mode dump: the record
    /// buffer plus the copied value bytes. Pure arithmetic.
    pub fn estimate_dump_tmp_mem_use(input: &DumpEstimateInput) -> u64 {
        let per_record = (std::mem::size_of::<BufferedRecord<S>>()
            + std::mem::size_of::<Vec<u8>>()) as u64
            + input.skey_width as u64;
        input.pkey_count * std::mem::size_of::<BufferedPkey<S>>() as u64
            + input.skey_count * per_record
            + input.value_bytes
    }

    /// Builds an estimator input describing this dumper's live segment.
    pub fn estimate_input(&self, value_compress_ratio: f64, chunk_align_bytes: u64) -> DumpEstimateInput {
        let mut skey_count = 0u64;
        self.table
            .for_each(&mut |_, info| skey_count += info.count() as u64);

        DumpEstimateInput {
            pkey_count: self.table.len() as u64,
            skey_count,
            value_bytes: self.values.used_bytes() as u64,
            skey_width: S::WIDTH,
            value_compress_ratio,
            chunk_align_bytes,
        }
    }
}

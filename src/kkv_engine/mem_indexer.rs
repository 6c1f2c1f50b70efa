use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::kkv_engine::config::{KkvIndexConfig, PkeyTablePolicy};
use crate::kkv_engine::constants::{
    INVALID_VALUE_OFFSET, PKEY_TABLE_ENTRY_BYTES, SKEY_ALL_DELETED_OFFSET,
    UNINITIALIZED_EXPIRE_TIME,
};
use crate::kkv_engine::document::{DocOperation, Document};
use crate::kkv_engine::dump_sink::DumpSink;
use crate::kkv_engine::index_dumper::KkvIndexDumper;
use crate::kkv_engine::pkey_table::{ChainedPkeyTable, DensePkeyTable, PkeyTable};
use crate::kkv_engine::record_filter::RecordFilter;
use crate::kkv_engine::skey_iterator::BuildingSkeyIterator;
use crate::kkv_engine::skey_node::SkeyListInfo;
use crate::kkv_engine::skey_writer::{SkeyWriter, SkeyWriterOptions};
use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;
use crate::kkv_engine::value_codec::{PlainValueCodec, ValueCodec};
use crate::kkv_engine::value_writer::{ArenaValueWriter, ValueWriter};

/// Builder of one in-memory ("building") segment.
///
/// Owns the prefix-key table, the suffix-key writer and the value arena for
/// the life of the segment, and is the segment's single writer: every
/// mutating method takes `&mut self`. Readers run concurrently through
/// [`KkvMemIndexer::create_skey_iterator`], which hands out shared
/// references to the same structures.
///
/// Capacity exhaustion anywhere surfaces as [`Status::NeedDump`]; the owner
/// responds by sealing this segment (stop feeding it), dumping it, and
/// rotating to a fresh indexer.
pub struct KkvMemIndexer<S: SuffixKey> {
    config: KkvIndexConfig,
    table: Arc<dyn PkeyTable>,
    writer: Arc<SkeyWriter<S>>,
    values: Arc<dyn ValueWriter>,
    codec: Box<dyn ValueCodec>,
    encode_buf: Vec<u8>,
}

impl<S: SuffixKey> KkvMemIndexer<S> {
    /// Sizes every sub-structure from the configured memory ceiling and
    /// picks the prefix-key hash policy. Fails fast on a bad config, before
    /// any allocation.
    pub fn new(config: KkvIndexConfig) -> Result<Self, Status> {
        config.validate()?;

        let pkey_capacity = (config.pkey_table_budget() / PKEY_TABLE_ENTRY_BYTES).max(1);
        let table: Arc<dyn PkeyTable> = match config.pkey_table_policy {
            PkeyTablePolicy::Chained => Arc::new(ChainedPkeyTable::with_capacity(pkey_capacity)),
            PkeyTablePolicy::Dense => Arc::new(DensePkeyTable::with_capacity(
                pkey_capacity,
                config.pkey_load_factor,
            )),
        };

        let mut writer_options = SkeyWriterOptions::new(config.skey_budget());
        writer_options.long_tail_threshold = config.long_tail_threshold;
        writer_options.max_link_step = config.max_link_step;
        let writer = Arc::new(SkeyWriter::new(writer_options)?);

        let values: Arc<dyn ValueWriter> =
            Arc::new(ArenaValueWriter::with_reserve(config.value_budget()));

        debug!(
            pkey_capacity,
            skey_budget = config.skey_budget(),
            value_budget = config.value_budget(),
            "building segment sized"
        );

        Ok(Self {
            config,
            table,
            writer,
            values,
            codec: Box::new(PlainValueCodec),
            encode_buf: Vec::new(),
        })
    }

    /// Swaps in a non-default value codec. Must happen before any build.
    pub fn with_codec(mut self, codec: Box<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Applies one document batch.
    ///
    /// Documents that are dropped upstream or target a different index are
    /// skipped. Per-document failures (including `NeedDump`) are recorded
    /// in the returned vector without aborting the batch; an unsupported
    /// operation type is the one hard error that aborts everything.
    pub fn build(&mut self, batch: &[Document]) -> Result<Vec<Result<(), Status>>, Status> {
        let mut results = Vec::with_capacity(batch.len());

        for doc in batch {
            if doc.dropped || doc.index_id != self.config.index_id {
                results.push(Ok(()));
                continue;
            }

            match doc.op {
                DocOperation::Add => results.push(self.add_document(doc)),
                DocOperation::Delete => results.push(self.delete_document(doc)),
                DocOperation::Update => {
                    return Err(Status::InternalError(
                        "update operation is not supported by the KKV index".into(),
                    ));
                }
            }
        }

        Ok(results)
    }

    /// Ingests one add-document: codec, value arena, node, link.
    pub fn add_document(&mut self, doc: &Document) -> Result<(), Status> {
        let skey = match doc.skey_hash {
            Some(hash) => S::from_raw(hash),
            None if self.config.allow_implicit_skey => S::from_raw(0),
            None => {
                return Err(Status::InvalidArgs(
                    "add document without a suffix key".into(),
                ));
            }
        };

        if self.is_full() {
            return Err(Status::NeedDump);
        }

        self.codec.encode(&doc.value, &mut self.encode_buf)?;
        if self.encode_buf.len() > self.config.max_value_len {
            return Err(Status::Corruption(format!(
                "value length {} exceeds ceiling {}",
                self.encode_buf.len(),
                self.config.max_value_len
            )));
        }

        let timestamp = doc.timestamp_secs();
        let expire_time = self.expire_time(timestamp, doc.ttl_secs);

        // The value goes in first; if anything after this refuses, the
        // bytes are simply abandoned with the rest of the arena at rotation.
        let value_offset = self.values.append(&self.encode_buf)?;

        let Some(node_offset) = self.writer.append(skey, timestamp, expire_time, value_offset)
        else {
            return Err(Status::NeedDump);
        };

        self.link(doc.pkey_hash, node_offset)
    }

    /// Ingests one delete: a suffix-key tombstone when the document names a
    /// suffix key, a whole-pkey tombstone otherwise.
    pub fn delete_document(&mut self, doc: &Document) -> Result<(), Status> {
        if self.is_full() {
            return Err(Status::NeedDump);
        }

        let timestamp = doc.timestamp_secs();
        let expire_time = self.expire_time(timestamp, doc.ttl_secs);

        let (skey, sentinel) = match doc.skey_hash {
            Some(hash) => (S::from_raw(hash), INVALID_VALUE_OFFSET),
            None => (S::from_raw(0), SKEY_ALL_DELETED_OFFSET),
        };

        let Some(node_offset) = self.writer.append(skey, timestamp, expire_time, sentinel) else {
            return Err(Status::NeedDump);
        };

        self.link(doc.pkey_hash, node_offset)
    }

    fn link(&mut self, pkey_hash: u64, node_offset: u32) -> Result<(), Status> {
        let info = match self.table.get(pkey_hash) {
            Some(info) => info,
            None => {
                // First sight of this prefix key. Single-writer contract:
                // nobody can have inserted it between the miss and here.
                let info = Arc::new(SkeyListInfo::new());
                if !self.table.insert(pkey_hash, Arc::clone(&info)) {
                    return Err(Status::NeedDump);
                }
                info
            }
        };

        if !self.writer.link_skey_node(&info, node_offset) {
            return Err(Status::NeedDump);
        }
        Ok(())
    }

    fn expire_time(&self, timestamp: u32, doc_ttl: Option<u32>) -> u32 {
        if !self.config.enable_ttl {
            return UNINITIALIZED_EXPIRE_TIME;
        }
        let ttl = doc_ttl.unwrap_or(self.config.ttl_secs);
        if ttl == 0 {
            return UNINITIALIZED_EXPIRE_TIME;
        }
        timestamp.saturating_add(ttl)
    }

    /// Seal/dump trigger: `true` once the prefix-key table or the
    /// suffix-key arenas hit their reserve.
    pub fn is_full(&self) -> bool {
        self.table.is_full() || self.writer.is_full()
    }

    /// Number of distinct prefix keys in the segment.
    pub fn pkey_count(&self) -> usize {
        self.table.len()
    }

    /// Opens a concurrent read cursor over one prefix key's list.
    pub fn create_skey_iterator(&self, pkey_hash: u64) -> Option<BuildingSkeyIterator<S>> {
        let info = self.table.get(pkey_hash)?;
        Some(BuildingSkeyIterator::new(Arc::clone(&self.writer), info))
    }

    /// Dumps the (sealed) segment through `sink` into `directory`, with the
    /// TTL filter derived from the segment config at the current wall clock.
    pub fn dump(&self, sink: &mut dyn DumpSink<S>, directory: &Path) -> Result<(), Status> {
        self.dumper().dump(sink, directory)
    }

    /// Like [`KkvMemIndexer::dump`], with an explicit record filter —
    /// filter policy is the caller's (and lets tests pin the clock).
    pub fn dump_with_filter(
        &self,
        sink: &mut dyn DumpSink<S>,
        directory: &Path,
        filter: RecordFilter,
    ) -> Result<(), Status> {
        self.dumper().with_filter(filter).dump(sink, directory)
    }

    fn dumper(&self) -> KkvIndexDumper<S> {
        KkvIndexDumper::new(
            Arc::clone(&self.table),
            Arc::clone(&self.writer),
            Arc::clone(&self.values),
            self.config.clone(),
        )
    }
}

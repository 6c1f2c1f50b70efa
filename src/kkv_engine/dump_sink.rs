use std::path::Path;

use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;

/// Sizing hints handed to a sink before the first record, so it can
/// pre-allocate tables and pick chunk sizes.
#[derive(Debug, Clone, Default)]
pub struct DumpLayoutHint {
    pub estimated_pkey_count: u64,
    pub estimated_skey_count: u64,
    pub estimated_value_bytes: u64,
}

/// One suffix-key record as the dumper/merger hands it to a sink.
///
/// `value` is `None` exactly when the record is a tombstone of either kind —
/// values are never fetched for deleted records.
#[derive(Debug)]
pub struct SinkDoc<'a, S> {
    pub skey: S,
    pub skey_deleted: bool,
    pub timestamp: u32,
    pub expire_time: u32,
    pub value: Option<&'a [u8]>,
}

/// Abstract on-disk segment writer consumed by dump and merge.
///
/// The production binary codec implements this outside the crate;
/// [`crate::kkv_engine::file_segment::FileSegmentSink`] is the in-crate
/// reference implementation. Call order is `init`, then `dump` once per
/// record with `is_last_node` set on each prefix key's final record (this
/// closes the per-pkey framing), then `close`. The aggregate accessors are
/// only meaningful after `close`.
pub trait DumpSink<S: SuffixKey>: Send {
    fn init(&mut self, directory: &Path, hint: &DumpLayoutHint) -> Result<(), Status>;

    /// Writes one record.
    ///
    /// # Parameters
    /// - `pkey_hash`: The record's prefix key.
    /// - `is_deleted_pkey`: `true` for a whole-pkey delete record; these
    ///   always precede the pkey's ordinary records.
    /// - `is_last_node`: `true` on the final record of this prefix key.
    /// - `doc`: The suffix-key record body.
    fn dump(
        &mut self,
        pkey_hash: u64,
        is_deleted_pkey: bool,
        is_last_node: bool,
        doc: &SinkDoc<'_, S>,
    ) -> Result<(), Status>;

    fn close(&mut self) -> Result<(), Status>;

    /// Distinct prefix keys written.
    fn pkey_count(&self) -> u64;

    /// Total suffix-key records written (tombstones included).
    fn total_skey_count(&self) -> u64;

    /// Largest per-pkey record count written.
    fn max_skey_count(&self) -> u32;

    /// Longest value written, bytes.
    fn max_value_len(&self) -> usize;
}

use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;

/// One prefix key's records during a merge, already resolved across source
/// segments: a later segment shadows an earlier one exactly like build-time
/// replace semantics (a newer whole-pkey tombstone hides everything older;
/// a newer suffix record hides the older record with the same skey).
///
/// The cursor walks the resolved records in ascending skey order. Values
/// are fetched lazily — the merger only asks for them on records it keeps
/// and that are not tombstones.
pub trait PkeyCursor<S: SuffixKey> {
    fn pkey_hash(&self) -> u64;

    /// `true` when the resolved view starts with a whole-pkey tombstone.
    fn has_pkey_deleted(&self) -> bool;

    /// Timestamp of that tombstone; meaningful only when
    /// [`PkeyCursor::has_pkey_deleted`] is `true`.
    fn pkey_deleted_ts(&self) -> u32;

    /// `true` while positioned on a record.
    fn is_valid(&self) -> bool;

    fn skey(&self) -> S;
    fn is_deleted(&self) -> bool;
    fn timestamp(&self) -> u32;
    fn expire_time(&self) -> u32;

    /// Copies the current record's value into `out` (cleared first).
    /// Only called on non-deleted records.
    fn value(&mut self, out: &mut Vec<u8>) -> Result<(), Status>;

    fn move_to_next(&mut self) -> Result<(), Status>;
}

/// Merge input: yields one resolved [`PkeyCursor`] per prefix key, in
/// globally ascending pkey-hash order.
///
/// The production implementation streams from the on-disk readers outside
/// this crate; [`crate::kkv_engine::file_segment::SegmentSetIterator`] is
/// the in-crate reference over reference segment files.
pub trait MultiSegmentIterator<S: SuffixKey> {
    /// Advances to the next prefix key and returns its cursor, or `None`
    /// when every source pkey has been consumed.
    fn next_pkey(&mut self) -> Result<Option<&mut dyn PkeyCursor<S>>, Status>;

    /// Total prefix keys this iterator will yield, when known; feeds the
    /// merge progress ratio. Zero means unknown.
    fn estimated_pkey_count(&self) -> u64 {
        0
    }
}

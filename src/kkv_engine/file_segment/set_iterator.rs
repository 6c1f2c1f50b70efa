use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use tracing::debug;

use super::reader::FileSegmentReader;
use super::value_handle::ValueHandle;
use crate::kkv_engine::segment_cursor::{MultiSegmentIterator, PkeyCursor};
use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;

#[derive(Debug, Clone)]
struct ResolvedRecord {
    skey_deleted: bool,
    timestamp: u32,
    expire_time: u32,
    value: Option<ValueHandle>,
}

#[derive(Debug)]
struct ResolvedPkey<S: SuffixKey> {
    pkey_deleted_ts: Option<u32>,
    records: BTreeMap<S, ResolvedRecord>,
}

impl<S: SuffixKey> Default for ResolvedPkey<S> {
    fn default() -> Self {
        Self {
            pkey_deleted_ts: None,
            records: BTreeMap::new(),
        }
    }
}

/// Reference [`MultiSegmentIterator`]: opens N reference segments and
/// resolves them up front.
///
/// Segments are given oldest first; resolution replays them in order with
/// build-time shadowing semantics — a newer whole-pkey tombstone clears
/// everything older for that pkey, a newer suffix record (tombstone
/// included) replaces the older record with the same skey. Values stay
/// zero-copy handles into the source mappings, so the resolved view costs
/// per-record bookkeeping, not value bytes.
pub struct SegmentSetIterator<S: SuffixKey> {
    queue: VecDeque<(u64, ResolvedPkey<S>)>,
    total_pkeys: u64,
    current: Option<ResolvedPkeyCursor<S>>,
}

impl<S: SuffixKey> SegmentSetIterator<S> {
    /// Opens and resolves `directories` (oldest segment first).
    pub fn open<P: AsRef<Path>>(directories: &[P]) -> Result<Self, Status> {
        let mut resolved: BTreeMap<u64, ResolvedPkey<S>> = BTreeMap::new();

        for directory in directories {
            let reader = FileSegmentReader::<S>::open(directory.as_ref())?;
            for record in reader.records() {
                let record = record?;
                let entry = resolved.entry(record.pkey_hash).or_default();

                if record.is_pkey_deleted {
                    // Newer tombstone shadows every older record.
                    entry.pkey_deleted_ts = Some(record.timestamp);
                    entry.records.clear();
                } else {
                    entry.records.insert(
                        record.skey,
                        ResolvedRecord {
                            skey_deleted: record.is_skey_deleted,
                            timestamp: record.timestamp,
                            expire_time: record.expire_time,
                            value: record.value,
                        },
                    );
                }
            }
        }

        let queue: VecDeque<(u64, ResolvedPkey<S>)> = resolved.into_iter().collect();
        let total_pkeys = queue.len() as u64;
        debug!(
            segments = directories.len(),
            pkeys = total_pkeys,
            "segment set resolved"
        );

        Ok(Self {
            queue,
            total_pkeys,
            current: None,
        })
    }
}

impl<S: SuffixKey> MultiSegmentIterator<S> for SegmentSetIterator<S> {
    fn next_pkey(&mut self) -> Result<Option<&mut dyn PkeyCursor<S>>, Status> {
        let Some((pkey_hash, resolved)) = self.queue.pop_front() else {
            self.current = None;
            return Ok(None);
        };

        self.current = Some(ResolvedPkeyCursor {
            pkey_hash,
            pkey_deleted_ts: resolved.pkey_deleted_ts,
            records: resolved.records.into_iter().collect(),
            position: 0,
        });
        Ok(self
            .current
            .as_mut()
            .map(|cursor| cursor as &mut dyn PkeyCursor<S>))
    }

    fn estimated_pkey_count(&self) -> u64 {
        self.total_pkeys
    }
}

struct ResolvedPkeyCursor<S> {
    pkey_hash: u64,
    pkey_deleted_ts: Option<u32>,
    /// Ascending skey order (inherited from the resolution map).
    records: Vec<(S, ResolvedRecord)>,
    position: usize,
}

impl<S: SuffixKey> PkeyCursor<S> for ResolvedPkeyCursor<S> {
    fn pkey_hash(&self) -> u64 {
        self.pkey_hash
    }

    fn has_pkey_deleted(&self) -> bool {
        self.pkey_deleted_ts.is_some()
    }

    fn pkey_deleted_ts(&self) -> u32 {
        self.pkey_deleted_ts.unwrap_or(0)
    }

    fn is_valid(&self) -> bool {
        self.position < self.records.len()
    }

    fn skey(&self) -> S {
        self.records[self.position].0
    }

    fn is_deleted(&self) -> bool {
        self.records[self.position].1.skey_deleted
    }

    fn timestamp(&self) -> u32 {
        self.records[self.position].1.timestamp
    }

    fn expire_time(&self) -> u32 {
        self.records[self.position].1.expire_time
    }

    fn value(&mut self, out: &mut Vec<u8>) -> Result<(), Status> {
        out.clear();
        match &self.records[self.position].1.value {
            Some(handle) => {
                out.extend_from_slice(handle.as_slice());
                Ok(())
            }
            None => Err(Status::InternalError(format!(
                "value requested for a tombstone record of pkey {:#x}",
                self.pkey_hash
            ))),
        }
    }

    fn move_to_next(&mut self) -> Result<(), Status> {
        if self.position < self.records.len() {
            self.position += 1;
        }
        Ok(())
    }
}

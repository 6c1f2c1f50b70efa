use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::kkv_engine::config::KkvIndexConfig;
use crate::kkv_engine::constants::{
    MERGE_PROGRESS_LOG_INTERVAL, MERGE_PROGRESS_RATIO_INTERVAL, UNINITIALIZED_EXPIRE_TIME,
};
use crate::kkv_engine::dump_sink::{DumpLayoutHint, DumpSink, SinkDoc};
use crate::kkv_engine::record_filter::RecordFilter;
use crate::kkv_engine::segment_cursor::{MultiSegmentIterator, PkeyCursor};
use crate::kkv_engine::status::Status;
use crate::kkv_engine::suffix_key::SuffixKey;

/// Per-merge policy parameters.
#[derive(Debug, Clone)]
pub struct MergeParams {
    /// `true` only on the bottom-level (final-tier) merge: tombstones and
    /// doc-expired records are permanently dropped instead of carried.
    pub drop_delete_key: bool,
    /// Evaluation clock for TTL decisions. Required whenever the config
    /// enables TTL.
    pub current_time_secs: Option<u32>,
}

/// Aggregate statistics persisted with a produced segment and reused by
/// later merges for sizing and reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentMetrics {
    pub pkey_count: u64,
    pub skey_count: u64,
    pub max_value_len: usize,
    pub max_skey_count: u32,
}

/// One source or target segment of a merge.
#[derive(Debug, Clone)]
pub struct SegmentMergeInfo {
    pub segment_id: u64,
    pub directory: PathBuf,
    /// Stats persisted when the segment was produced; absent for segments
    /// written by codecs that do not carry them.
    pub metrics: Option<SegmentMetrics>,
}

impl SegmentMergeInfo {
    pub fn new(segment_id: u64, directory: impl Into<PathBuf>) -> Self {
        Self {
            segment_id,
            directory: directory.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SegmentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// N-way merge of on-disk segments into exactly one target segment.
///
/// The cross-segment resolution itself lives in the
/// [`MultiSegmentIterator`]; the merger applies policy — TTL, tombstone
/// carrying vs dropping — and drives the sink. Sink failures propagate as
/// [`Status`] like every other error in the engine.
#[derive(Debug)]
pub struct KkvMerger<S: SuffixKey> {
    params: MergeParams,
    filter: RecordFilter,
    /// Completion ratio in `[0, 1]`, stored as `f64` bits so supervisors
    /// can poll it from another thread between pkeys.
    progress_ratio: AtomicU64,
    _marker: std::marker::PhantomData<S>,
}

impl<S: SuffixKey> KkvMerger<S> {
    /// Validates the policy parameters against the index config and builds
    /// the TTL record filter.
    pub fn new(config: &KkvIndexConfig, params: MergeParams) -> Result<Self, Status> {
        config.validate()?;

        let filter = if config.enable_ttl {
            let Some(now_secs) = params.current_time_secs else {
                return Err(Status::InvalidArgs(
                    "TTL-enabled merge requires current_time_secs".into(),
                ));
            };
            RecordFilter::with_ttl(config.ttl_secs, now_secs)
        } else {
            RecordFilter::disabled()
        };

        Ok(Self {
            params,
            filter,
            progress_ratio: AtomicU64::new(0f64.to_bits()),
            _marker: std::marker::PhantomData,
        })
    }

    /// Completion ratio of the running (or finished) merge, in `[0, 1]`.
    pub fn progress_ratio(&self) -> f64 {
        f64::from_bits(self.progress_ratio.load(Ordering::Relaxed))
    }

    fn set_progress_ratio(&self, ratio: f64) {
        self.progress_ratio
            .store(ratio.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Merges `sources` into the single segment described by `targets`.
    ///
    /// # Returns
    /// - `Ok(SegmentMetrics)`: Stats of the produced segment, to persist
    ///   alongside it.
    /// - `Err(Status::Unimplement)`: More (or fewer) than one target.
    /// - `Err(Status::InternalError)`: Target directory not preparable.
    pub fn merge(
        &mut self,
        sources: &[SegmentMergeInfo],
        targets: &[SegmentMergeInfo],
        iterator: &mut dyn MultiSegmentIterator<S>,
        sink: &mut dyn DumpSink<S>,
    ) -> Result<SegmentMetrics, Status> {
        let [target] = targets else {
            return Err(Status::Unimplement(format!(
                "kkv merge produces exactly one target segment, got {}",
                targets.len()
            )));
        };

        Self::prepare_target_directory(&target.directory)?;

        // Source stats, persisted at dump/merge time, feed sizing and the
        // final report.
        let mut hint = DumpLayoutHint::default();
        for source in sources {
            if let Some(metrics) = &source.metrics {
                hint.estimated_pkey_count += metrics.pkey_count;
                hint.estimated_skey_count += metrics.skey_count;
            }
        }
        info!(
            sources = sources.len(),
            source_pkeys = hint.estimated_pkey_count,
            source_skeys = hint.estimated_skey_count,
            target = %target.directory.display(),
            bottom_level = self.params.drop_delete_key,
            "kkv merge starting"
        );

        sink.init(&target.directory, &hint)?;
        self.do_merge(iterator, sink)?;
        sink.close()?;

        let metrics = Self::fill_segment_metrics(sink);
        info!(
            pkey_count = metrics.pkey_count,
            skey_count = metrics.skey_count,
            "kkv merge finished"
        );
        Ok(metrics)
    }

    fn prepare_target_directory(directory: &Path) -> Result<(), Status> {
        if directory.exists() {
            std::fs::remove_dir_all(directory).map_err(|error| {
                Status::InternalError(format!(
                    "cannot clear target directory {}: {error}",
                    directory.display()
                ))
            })?;
        }
        std::fs::create_dir_all(directory).map_err(|error| {
            Status::InternalError(format!(
                "cannot create target directory {}: {error}",
                directory.display()
            ))
        })
    }

    fn do_merge(
        &self,
        iterator: &mut dyn MultiSegmentIterator<S>,
        sink: &mut dyn DumpSink<S>,
    ) -> Result<(), Status> {
        let estimated = iterator.estimated_pkey_count();
        let mut processed: u64 = 0;
        let mut value_buf = Vec::new();

        while let Some(cursor) = iterator.next_pkey()? {
            self.collect_single_prefix_key(cursor, sink, &mut value_buf)?;

            processed += 1;
            if processed % MERGE_PROGRESS_LOG_INTERVAL == 0 {
                info!(processed, "kkv merge progress");
            }
            if processed % MERGE_PROGRESS_RATIO_INTERVAL == 0 && estimated > 0 {
                self.set_progress_ratio(processed as f64 / estimated as f64);
            }
        }

        self.set_progress_ratio(1.0);
        debug!(processed, "kkv merge consumed all prefix keys");
        Ok(())
    }

    /// Emits one resolved prefix key: optional carried tombstone first,
    /// then every policy-surviving record, `is_last_node` on the final one.
    fn collect_single_prefix_key(
        &self,
        cursor: &mut dyn PkeyCursor<S>,
        sink: &mut dyn DumpSink<S>,
        value_buf: &mut Vec<u8>,
    ) -> Result<(), Status> {
        let pkey_hash = cursor.pkey_hash();
        self.move_to_first_valid_skey_position(cursor)?;

        // The whole-pkey tombstone is carried through intermediate merges
        // (still shadowing older tiers) and dropped for good at the bottom.
        let carry_tombstone = !self.params.drop_delete_key
            && cursor.has_pkey_deleted()
            && self.filter.keep(cursor.pkey_deleted_ts());
        if carry_tombstone {
            let doc = SinkDoc {
                skey: S::from_raw(0),
                skey_deleted: false,
                timestamp: cursor.pkey_deleted_ts(),
                expire_time: UNINITIALIZED_EXPIRE_TIME,
                value: None,
            };
            sink.dump(pkey_hash, true, !cursor.is_valid(), &doc)?;
        }

        while cursor.is_valid() {
            let skey = cursor.skey();
            let skey_deleted = cursor.is_deleted();
            let timestamp = cursor.timestamp();
            let expire_time = cursor.expire_time();

            if !skey_deleted {
                cursor.value(value_buf)?;
            }

            cursor.move_to_next()?;
            self.skip_invalid_records(cursor)?;
            let is_last = !cursor.is_valid();

            let doc = SinkDoc {
                skey,
                skey_deleted,
                timestamp,
                expire_time,
                value: (!skey_deleted).then_some(value_buf.as_slice()),
            };
            sink.dump(pkey_hash, false, is_last, &doc)?;
        }

        Ok(())
    }

    /// Parks the cursor on the first record the merge policy keeps.
    fn move_to_first_valid_skey_position(
        &self,
        cursor: &mut dyn PkeyCursor<S>,
    ) -> Result<(), Status> {
        self.skip_invalid_records(cursor)
    }

    fn skip_invalid_records(&self, cursor: &mut dyn PkeyCursor<S>) -> Result<(), Status> {
        while cursor.is_valid() {
            // TTL-expired records are dropped at every merge tier.
            if !self.filter.keep(cursor.timestamp()) {
                cursor.move_to_next()?;
                continue;
            }
            // Suffix tombstones and doc-expired records survive until the
            // bottom level, where nothing older can resurface.
            if self.params.drop_delete_key
                && (cursor.is_deleted() || self.doc_expired(cursor.expire_time()))
            {
                cursor.move_to_next()?;
                continue;
            }
            break;
        }
        Ok(())
    }

    fn doc_expired(&self, expire_time: u32) -> bool {
        if expire_time == UNINITIALIZED_EXPIRE_TIME {
            return false;
        }
        match self.params.current_time_secs {
            Some(now_secs) => now_secs >= expire_time,
            None => false,
        }
    }

    /// Packages the sink's post-close aggregates for persistence with the
    /// produced segment.
    pub fn fill_segment_metrics(sink: &dyn DumpSink<S>) -> SegmentMetrics {
        SegmentMetrics {
            pkey_count: sink.pkey_count(),
            skey_count: sink.total_skey_count(),
            max_value_len: sink.max_value_len(),
            max_skey_count: sink.max_skey_count(),
        }
    }
}

#[cfg(test)]
mod tests {

    use kkv_store::kkv_engine::file_segment::{FileSegmentSink, SegmentSetIterator};
    use kkv_store::{
        Document, KkvIndexConfig, KkvMemIndexer, KkvMerger, MergeParams, SegmentMergeInfo, Status,
    };
    use std::path::Path;
    use tempfile::tempdir;

    fn plain_config() -> KkvIndexConfig {
        KkvIndexConfig {
            build_memory_bytes: 256 * 1024,
            ..Default::default()
        }
    }

    fn ttl_config(ttl_secs: u32) -> KkvIndexConfig {
        KkvIndexConfig {
            enable_ttl: true,
            ttl_secs,
            ..plain_config()
        }
    }

    fn dump_segment(config: &KkvIndexConfig, docs: &[Document], directory: &Path) {
        let mut indexer: KkvMemIndexer<u64> =
            KkvMemIndexer::new(config.clone()).expect("config validates");
        let results = indexer.build(docs).expect("batch runs");
        assert!(results.iter().all(Result::is_ok));

        let mut sink = FileSegmentSink::new();
        indexer.dump(&mut sink, directory).expect("dump succeeds");
    }

    /// Decoded record: (pkey, pkey_deleted, skey_deleted, skey, ts, value).
    type Decoded = (u64, bool, bool, u64, u32, Option<Vec<u8>>);

    fn read_back(directory: &Path) -> Vec<Decoded> {
        use kkv_store::kkv_engine::file_segment::FileSegmentReader;
        FileSegmentReader::<u64>::open(directory)
            .expect("segment opens")
            .records()
            .map(|record| {
                let record = record.expect("record decodes");
                (
                    record.pkey_hash,
                    record.is_pkey_deleted,
                    record.is_skey_deleted,
                    record.skey,
                    record.timestamp,
                    record.value.map(|handle| handle.as_slice().to_vec()),
                )
            })
            .collect()
    }

    fn merge_dirs(
        config: &KkvIndexConfig,
        params: MergeParams,
        source_dirs: &[&Path],
        target_dir: &Path,
    ) -> (kkv_store::SegmentMetrics, f64) {
        let mut merger: KkvMerger<u64> = KkvMerger::new(config, params).expect("params validate");

        let sources: Vec<SegmentMergeInfo> = source_dirs
            .iter()
            .enumerate()
            .map(|(id, dir)| SegmentMergeInfo::new(id as u64, *dir))
            .collect();
        let targets = vec![SegmentMergeInfo::new(100, target_dir)];

        let mut iterator = SegmentSetIterator::<u64>::open(source_dirs).expect("sources open");
        let mut sink = FileSegmentSink::new();

        let metrics = merger
            .merge(&sources, &targets, &mut iterator, &mut sink)
            .expect("merge succeeds");
        (metrics, merger.progress_ratio())
    }

    fn carry_params() -> MergeParams {
        MergeParams {
            drop_delete_key: false,
            current_time_secs: None,
        }
    }

    fn bottom_params(now_secs: Option<u32>) -> MergeParams {
        MergeParams {
            drop_delete_key: true,
            current_time_secs: now_secs,
        }
    }

    #[test]
    fn single_segment_merge_reproduces_content() {
        let source = tempdir().expect("temp dir");
        let target_root = tempdir().expect("temp dir");
        let target = target_root.path().join("merged");

        let config = plain_config();
        dump_segment(
            &config,
            &[
                Document::add(1, 10, 1_000, b"ten".to_vec()),
                Document::add(1, 20, 2_000, b"twenty".to_vec()),
                Document::delete_skey(1, 20, 3_000),
                Document::delete_pkey(2, 4_000),
                Document::add(2, 5, 5_000, b"five".to_vec()),
            ],
            source.path(),
        );

        let (metrics, ratio) = merge_dirs(&config, carry_params(), &[source.path()], &target);

        assert_eq!(
            read_back(source.path()),
            read_back(&target),
            "a carry merge of one segment is the identity"
        );
        assert_eq!(metrics.pkey_count, 2);
        assert_eq!(metrics.skey_count, 3, "pkey tombstone is framing, not a skey");
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn bottom_level_merge_drops_tombstones() {
        let source = tempdir().expect("temp dir");
        let target_root = tempdir().expect("temp dir");
        let target = target_root.path().join("merged");

        let config = plain_config();
        dump_segment(
            &config,
            &[
                Document::add(1, 10, 1_000, b"ten".to_vec()),
                Document::add(1, 20, 2_000, b"twenty".to_vec()),
                Document::delete_skey(1, 20, 3_000),
                Document::delete_pkey(2, 4_000),
                Document::add(2, 5, 5_000, b"five".to_vec()),
            ],
            source.path(),
        );

        let (metrics, _) = merge_dirs(&config, bottom_params(None), &[source.path()], &target);

        let records = read_back(&target);
        assert_eq!(
            records,
            vec![
                (1, false, false, 10, 1, Some(b"ten".to_vec())),
                (2, false, false, 5, 5, Some(b"five".to_vec())),
            ],
            "both tombstone kinds are gone, live records remain"
        );
        assert_eq!(metrics.pkey_count, 2);
        assert_eq!(metrics.skey_count, 2);
    }

    #[test]
    fn newer_segment_shadows_older() {
        let older = tempdir().expect("temp dir");
        let newer = tempdir().expect("temp dir");
        let target_root = tempdir().expect("temp dir");
        let target = target_root.path().join("merged");

        let config = plain_config();
        dump_segment(
            &config,
            &[
                Document::add(1, 1, 1_000, b"old-1".to_vec()),
                Document::add(1, 2, 1_000, b"old-2".to_vec()),
                Document::add(3, 1, 1_000, b"old-3-1".to_vec()),
            ],
            older.path(),
        );
        dump_segment(
            &config,
            &[
                Document::add(1, 2, 9_000, b"new-2".to_vec()),
                Document::add(1, 3, 9_000, b"new-3".to_vec()),
                Document::delete_pkey(3, 9_000),
            ],
            newer.path(),
        );

        let (_, _) = merge_dirs(
            &config,
            carry_params(),
            &[older.path(), newer.path()],
            &target,
        );

        let records = read_back(&target);
        assert_eq!(
            records,
            vec![
                (1, false, false, 1, 1, Some(b"old-1".to_vec())),
                (1, false, false, 2, 9, Some(b"new-2".to_vec())),
                (1, false, false, 3, 9, Some(b"new-3".to_vec())),
                (3, true, false, 0, 9, None),
            ],
            "per-skey newest wins; a newer pkey tombstone hides older records"
        );
    }

    #[test]
    fn ttl_expired_records_drop_at_every_tier() {
        let source = tempdir().expect("temp dir");
        let target_root = tempdir().expect("temp dir");
        let target = target_root.path().join("merged");

        let config = ttl_config(100);
        dump_segment(
            &config,
            &[
                Document::add(1, 1, 1_000_000, b"stale".to_vec()), // ts = 1000 s
                Document::add(1, 2, 1_950_000, b"fresh".to_vec()), // ts = 1950 s
            ],
            source.path(),
        );

        let (_, _) = merge_dirs(
            &config,
            MergeParams {
                drop_delete_key: false,
                current_time_secs: Some(2_000),
            },
            &[source.path()],
            &target,
        );

        let records = read_back(&target);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].3, 2, "only the fresh record survives");
    }

    #[test]
    fn doc_expired_records_drop_only_at_bottom_level() {
        let source = tempdir().expect("temp dir");
        let carry_root = tempdir().expect("temp dir");
        let bottom_root = tempdir().expect("temp dir");

        // Generous segment TTL; the document-level TTL is what expires.
        let config = ttl_config(100_000);
        dump_segment(
            &config,
            &[
                Document::add(1, 1, 1_990_000, b"short-lived".to_vec()).with_ttl(5),
                Document::add(1, 2, 1_990_000, b"long-lived".to_vec()),
            ],
            source.path(),
        );

        let carry_target = carry_root.path().join("merged");
        let (_, _) = merge_dirs(
            &config,
            MergeParams {
                drop_delete_key: false,
                current_time_secs: Some(2_000),
            },
            &[source.path()],
            &carry_target,
        );
        assert_eq!(
            read_back(&carry_target).len(),
            2,
            "intermediate tiers carry doc-expired records"
        );

        let bottom_target = bottom_root.path().join("merged");
        let (_, _) = merge_dirs(
            &config,
            bottom_params(Some(2_000)),
            &[source.path()],
            &bottom_target,
        );
        let records = read_back(&bottom_target);
        assert_eq!(records.len(), 1, "bottom level drops the expired document");
        assert_eq!(records[0].3, 2);
    }

    #[test]
    fn merge_supports_exactly_one_target() {
        let source = tempdir().expect("temp dir");
        let target_root = tempdir().expect("temp dir");

        let config = plain_config();
        dump_segment(
            &config,
            &[Document::add(1, 1, 1_000, b"v".to_vec())],
            source.path(),
        );

        let mut merger: KkvMerger<u64> =
            KkvMerger::new(&config, carry_params()).expect("params validate");
        let sources = vec![SegmentMergeInfo::new(0, source.path())];
        let targets = vec![
            SegmentMergeInfo::new(1, target_root.path().join("a")),
            SegmentMergeInfo::new(2, target_root.path().join("b")),
        ];

        let mut iterator = SegmentSetIterator::<u64>::open(&[source.path()]).expect("opens");
        let mut sink = FileSegmentSink::new();
        let error = merger
            .merge(&sources, &targets, &mut iterator, &mut sink)
            .expect_err("two targets must be refused");
        assert!(matches!(error, Status::Unimplement(_)));
    }

    #[test]
    fn ttl_merge_requires_a_clock() {
        let error = KkvMerger::<u64>::new(&ttl_config(60), carry_params())
            .expect_err("TTL without a clock must be refused");
        assert!(matches!(error, Status::InvalidArgs(_)));
    }

    #[test]
    fn merge_metrics_match_the_produced_footer() {
        let source = tempdir().expect("temp dir");
        let target_root = tempdir().expect("temp dir");
        let target = target_root.path().join("merged");

        let config = plain_config();
        dump_segment(
            &config,
            &[
                Document::add(1, 1, 1_000, b"a".to_vec()),
                Document::add(1, 2, 1_000, b"bb".to_vec()),
                Document::add(2, 1, 1_000, b"ccc".to_vec()),
            ],
            source.path(),
        );

        let (metrics, _) = merge_dirs(&config, carry_params(), &[source.path()], &target);

        use kkv_store::kkv_engine::file_segment::FileSegmentReader;
        let reader = FileSegmentReader::<u64>::open(&target).expect("opens");
        let footer = reader.footer();
        assert_eq!(metrics.pkey_count, footer.pkey_count);
        assert_eq!(metrics.skey_count, footer.skey_count);
        assert_eq!(metrics.max_value_len as u64, footer.max_value_len);
        assert_eq!(metrics.max_skey_count, footer.max_skey_count);
        assert_eq!(metrics.max_skey_count, 2);
        assert_eq!(metrics.max_value_len, 3);
    }
}

#[cfg(test)]
mod tests {

    use kkv_store::kkv_engine::file_segment::{
        FileSegmentReader, FileSegmentSink, SEGMENT_FILE_NAME,
    };
    use kkv_store::{
        Document, DumpEstimateInput, DumpMode, KkvIndexConfig, KkvIndexDumper, KkvMemIndexer,
        RecordFilter, Status,
    };
    use tempfile::tempdir;

    fn config(dump_mode: DumpMode) -> KkvIndexConfig {
        KkvIndexConfig {
            build_memory_bytes: 256 * 1024,
            dump_mode,
            ..Default::default()
        }
    }

    /// A fixture with live records, a suffix tombstone and a whole-pkey
    /// tombstone across three prefix keys.
    fn build_fixture(dump_mode: DumpMode) -> KkvMemIndexer<u64> {
        let mut indexer: KkvMemIndexer<u64> =
            KkvMemIndexer::new(config(dump_mode)).expect("config validates");

        let batch = vec![
            Document::add(1, 10, 1_000, b"one-ten".to_vec()),
            Document::add(1, 20, 2_000, b"one-twenty".to_vec()),
            Document::add(1, 30, 3_000, b"one-thirty".to_vec()),
            Document::delete_skey(1, 20, 4_000),
            Document::delete_pkey(2, 5_000),
            Document::add(2, 5, 6_000, b"two-five".to_vec()),
            Document::add(2, 7, 7_000, b"two-seven".to_vec()),
            Document::add(3, 1, 8_000, b"three-one".to_vec()),
        ];
        let results = indexer.build(&batch).expect("batch runs");
        assert!(results.iter().all(Result::is_ok));
        indexer
    }

    /// Decoded record: (pkey, pkey_deleted, skey_deleted, last, skey, ts, value).
    type Decoded = (u64, bool, bool, bool, u64, u32, Option<Vec<u8>>);

    fn read_back(directory: &std::path::Path) -> Vec<Decoded> {
        let reader = FileSegmentReader::<u64>::open(directory).expect("segment opens");
        reader
            .records()
            .map(|record| {
                let record = record.expect("record decodes");
                (
                    record.pkey_hash,
                    record.is_pkey_deleted,
                    record.is_skey_deleted,
                    record.is_last_node,
                    record.skey,
                    record.timestamp,
                    record.value.map(|handle| handle.as_slice().to_vec()),
                )
            })
            .collect()
    }

    #[test]
    fn offline_dump_round_trips() {
        let indexer = build_fixture(DumpMode::Offline);
        let dir = tempdir().expect("temp dir");

        let mut sink = FileSegmentSink::new();
        indexer.dump(&mut sink, dir.path()).expect("dump succeeds");

        let records = read_back(dir.path());
        let expected: Vec<Decoded> = vec![
            (1, false, false, false, 10, 1, Some(b"one-ten".to_vec())),
            (1, false, true, false, 20, 4, None),
            (1, false, false, true, 30, 3, Some(b"one-thirty".to_vec())),
            (2, true, false, false, 0, 5, None),
            (2, false, false, false, 5, 6, Some(b"two-five".to_vec())),
            (2, false, false, true, 7, 7, Some(b"two-seven".to_vec())),
            (3, false, false, true, 1, 8, Some(b"three-one".to_vec())),
        ];
        assert_eq!(records, expected);

        let reader = FileSegmentReader::<u64>::open(dir.path()).expect("segment opens");
        let footer = reader.footer();
        assert_eq!(footer.record_count, 7);
        assert_eq!(footer.pkey_count, 3);
        assert_eq!(footer.skey_count, 6, "the pkey-delete record is framing");
        assert_eq!(footer.max_skey_count, 3);
        assert_eq!(footer.max_value_len, b"one-thirty".len() as u64);
    }

    #[test]
    fn online_and_offline_dumps_are_identical() {
        let dir_offline = tempdir().expect("temp dir");
        let dir_online = tempdir().expect("temp dir");

        let mut sink = FileSegmentSink::new();
        build_fixture(DumpMode::Offline)
            .dump(&mut sink, dir_offline.path())
            .expect("offline dump");

        let mut sink = FileSegmentSink::new();
        build_fixture(DumpMode::Online)
            .dump(&mut sink, dir_online.path())
            .expect("online dump");

        assert_eq!(
            read_back(dir_offline.path()),
            read_back(dir_online.path()),
            "dump mode changes hold time, never output"
        );
    }

    #[test]
    fn expired_pkey_tombstone_is_not_dumped() {
        let mut indexer: KkvMemIndexer<u64> =
            KkvMemIndexer::new(config(DumpMode::Offline)).expect("config validates");

        let batch = vec![
            Document::delete_pkey(9, 1_000_000), // ts = 1000 s
            Document::add(9, 4, 1_000_000, b"survivor".to_vec()),
        ];
        indexer.build(&batch).expect("batch runs");

        let dir = tempdir().expect("temp dir");
        let mut sink = FileSegmentSink::new();
        // TTL 100 s, evaluated at t = 2000 s: the tombstone is long expired.
        indexer
            .dump_with_filter(&mut sink, dir.path(), RecordFilter::with_ttl(100, 2_000))
            .expect("dump succeeds");

        let records = read_back(dir.path());
        assert_eq!(records.len(), 1, "suffix records are not TTL-filtered here");
        let (pkey, pkey_deleted, _, last, skey, ..) = records[0].clone();
        assert_eq!(pkey, 9);
        assert!(!pkey_deleted, "the expired tombstone was dropped");
        assert!(last);
        assert_eq!(skey, 4);
    }

    #[test]
    fn fresh_pkey_tombstone_is_dumped() {
        let mut indexer: KkvMemIndexer<u64> =
            KkvMemIndexer::new(config(DumpMode::Offline)).expect("config validates");
        indexer
            .build(&[Document::delete_pkey(9, 1_990_000)])
            .expect("batch runs");

        let dir = tempdir().expect("temp dir");
        let mut sink = FileSegmentSink::new();
        indexer
            .dump_with_filter(&mut sink, dir.path(), RecordFilter::with_ttl(100, 2_000))
            .expect("dump succeeds");

        let records = read_back(dir.path());
        assert_eq!(records.len(), 1);
        assert!(records[0].1, "a TTL-passing tombstone is carried");
        assert!(records[0].3, "and closes its pkey's framing");
    }

    #[test]
    fn corrupted_record_is_detected_on_read() {
        let indexer = build_fixture(DumpMode::Offline);
        let dir = tempdir().expect("temp dir");
        let mut sink = FileSegmentSink::new();
        indexer.dump(&mut sink, dir.path()).expect("dump succeeds");

        // Flip one byte inside the first record's body.
        let path = dir.path().join(SEGMENT_FILE_NAME);
        let mut bytes = std::fs::read(&path).expect("file reads");
        bytes[16] ^= 0xff;
        std::fs::write(&path, &bytes).expect("file writes");

        let reader = FileSegmentReader::<u64>::open(dir.path()).expect("footer still valid");
        let first = reader.records().next().expect("one item");
        assert!(matches!(first, Err(Status::Corruption(_))));
    }

    #[test]
    fn truncated_file_fails_to_open() {
        let indexer = build_fixture(DumpMode::Offline);
        let dir = tempdir().expect("temp dir");
        let mut sink = FileSegmentSink::new();
        indexer.dump(&mut sink, dir.path()).expect("dump succeeds");

        let path = dir.path().join(SEGMENT_FILE_NAME);
        let bytes = std::fs::read(&path).expect("file reads");
        std::fs::write(&path, &bytes[..bytes.len() - 5]).expect("file writes");

        assert!(matches!(
            FileSegmentReader::<u64>::open(dir.path()),
            Err(Status::Corruption(_))
        ));
    }

    #[test]
    fn size_estimates_are_aligned_and_monotonic() {
        let base = DumpEstimateInput {
            pkey_count: 10,
            skey_count: 100,
            value_bytes: 10_000,
            skey_width: 8,
            value_compress_ratio: 1.0,
            chunk_align_bytes: 4_096,
        };

        let size = KkvIndexDumper::<u64>::estimate_dump_file_size(&base);
        assert_eq!(size % 4_096, 0, "estimate rounds to the chunk size");
        assert!(size as usize >= 10_000, "at least the raw value bytes");

        let mut bigger = base.clone();
        bigger.skey_count = 1_000;
        assert!(KkvIndexDumper::<u64>::estimate_dump_file_size(&bigger) >= size);

        let mut compressed = base.clone();
        compressed.value_compress_ratio = 0.25;
        assert!(KkvIndexDumper::<u64>::estimate_dump_file_size(&compressed) <= size);

        let tmp = KkvIndexDumper::<u64>::estimate_dump_tmp_mem_use(&base);
        assert!(
            tmp >= base.value_bytes,
            "online dump buffers at least the value bytes"
        );
    }
}

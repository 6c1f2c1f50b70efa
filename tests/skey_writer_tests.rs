#[cfg(test)]
mod tests {

    use kkv_store::kkv_engine::constants::{
        INVALID_OFFSET, INVALID_VALUE_OFFSET, SKEY_ALL_DELETED_OFFSET, UNINITIALIZED_EXPIRE_TIME,
    };
    use kkv_store::kkv_engine::SkeyNode;
    use kkv_store::{BuildingSkeyIterator, SkeyListInfo, SkeyWriter, SkeyWriterOptions};
    use rand::seq::SliceRandom;
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::Arc;

    /// Helper: a writer sized for `nodes` suffix-key nodes.
    fn build_writer(nodes: usize, long_tail_threshold: u32, max_link_step: u32) -> SkeyWriter<u64> {
        let mut options = SkeyWriterOptions::new(nodes * std::mem::size_of::<SkeyNode<u64>>());
        options.long_tail_threshold = long_tail_threshold;
        options.max_link_step = max_link_step;
        SkeyWriter::new(options).expect("writer options must validate")
    }

    fn put(writer: &SkeyWriter<u64>, info: &SkeyListInfo, skey: u64, ts: u32, value_offset: u64) {
        let offset = writer
            .append(skey, ts, UNINITIALIZED_EXPIRE_TIME, value_offset)
            .expect("arena has room");
        assert!(writer.link_skey_node(info, offset), "link must succeed");
    }

    fn delete_skey(writer: &SkeyWriter<u64>, info: &SkeyListInfo, skey: u64, ts: u32) {
        let offset = writer
            .append(skey, ts, UNINITIALIZED_EXPIRE_TIME, INVALID_VALUE_OFFSET)
            .expect("arena has room");
        assert!(writer.link_skey_node(info, offset));
    }

    fn delete_pkey(writer: &SkeyWriter<u64>, info: &SkeyListInfo, ts: u32) {
        let offset = writer
            .append(0, ts, UNINITIALIZED_EXPIRE_TIME, SKEY_ALL_DELETED_OFFSET)
            .expect("arena has room");
        assert!(writer.link_skey_node(info, offset));
    }

    /// Walks the list, returning `(skey, is_deleted, ts, value_offset)`.
    fn collect(
        writer: &Arc<SkeyWriter<u64>>,
        info: &Arc<SkeyListInfo>,
    ) -> Vec<(u64, bool, u32, u64)> {
        let mut iter = BuildingSkeyIterator::new(Arc::clone(writer), Arc::clone(info));
        let mut out = Vec::new();
        while iter.is_valid() {
            out.push((
                iter.skey(),
                iter.is_deleted(),
                iter.timestamp(),
                iter.value_offset(),
            ));
            iter.move_to_next();
        }
        out
    }

    #[test]
    fn ascending_invariant_under_random_insertion_order() {
        let writer = Arc::new(build_writer(2_048, 16, u32::MAX));
        let info = Arc::new(SkeyListInfo::new());

        let mut skeys: Vec<u64> = (0..600).map(|i| i * 3).collect();
        let mut rng = StdRng::seed_from_u64(7);
        skeys.shuffle(&mut rng);

        for (ts, &skey) in skeys.iter().enumerate() {
            put(&writer, &info, skey, ts as u32, skey + 1);
        }

        let walked = collect(&writer, &info);
        assert_eq!(walked.len(), 600, "walk length equals distinct live skeys");
        assert_eq!(info.count(), 600);

        for window in walked.windows(2) {
            assert!(
                window[0].0 < window[1].0,
                "suffix keys must be strictly ascending: {} then {}",
                window[0].0,
                window[1].0
            );
        }
    }

    #[test]
    fn reinsert_replaces_without_growing() {
        let writer = Arc::new(build_writer(256, 100, u32::MAX));
        let info = Arc::new(SkeyListInfo::new());

        for skey in [10u64, 20, 30] {
            put(&writer, &info, skey, 1, skey);
        }
        assert_eq!(info.count(), 3);

        // Re-insert the middle key with a fresh value and timestamp.
        put(&writer, &info, 20, 99, 777);

        assert_eq!(info.count(), 3, "replace must not change the count");
        let walked = collect(&writer, &info);
        assert_eq!(
            walked,
            vec![(10, false, 1, 10), (20, false, 99, 777), (30, false, 1, 30)]
        );
    }

    #[test]
    fn tombstone_then_reinsert_same_skey() {
        let writer = Arc::new(build_writer(256, 100, u32::MAX));
        let info = Arc::new(SkeyListInfo::new());

        put(&writer, &info, 5, 1, 50);
        delete_skey(&writer, &info, 5, 2);

        let walked = collect(&writer, &info);
        assert_eq!(walked.len(), 1);
        assert!(walked[0].1, "the record must now be a tombstone");
        assert_eq!(info.count(), 1);

        put(&writer, &info, 5, 3, 51);
        let walked = collect(&writer, &info);
        assert_eq!(walked, vec![(5, false, 3, 51)]);
        assert_eq!(info.count(), 1);
    }

    #[test]
    fn whole_pkey_delete_resets_the_list() {
        let writer = Arc::new(build_writer(1_024, 8, u32::MAX));
        let info = Arc::new(SkeyListInfo::new());

        // Enough entries to have built a block chain.
        for skey in 0..64u64 {
            put(&writer, &info, skey, skey as u32, skey);
        }
        assert_ne!(info.block_header(), INVALID_OFFSET, "skip list expected");

        delete_pkey(&writer, &info, 4_000);

        assert_eq!(info.count(), 1, "tombstone is the entire list");
        assert_eq!(info.block_header(), INVALID_OFFSET);

        let mut iter = BuildingSkeyIterator::new(Arc::clone(&writer), Arc::clone(&info));
        assert!(iter.has_pkey_deleted());
        assert_eq!(iter.pkey_deleted_ts(), 4_000);
        assert!(!iter.is_valid(), "no entries after the tombstone");

        // The list keeps working after the reset.
        for skey in [9u64, 3, 6] {
            put(&writer, &info, skey, 5_000, skey);
        }
        let walked = collect(&writer, &info);
        assert_eq!(
            walked.iter().map(|r| r.0).collect::<Vec<_>>(),
            vec![3, 6, 9]
        );

        let iter = BuildingSkeyIterator::new(Arc::clone(&writer), Arc::clone(&info));
        assert!(iter.has_pkey_deleted(), "tombstone stays at the head");
    }

    #[test]
    fn seek_and_linear_scan_agree_after_skip_list_builds() {
        let writer = Arc::new(build_writer(4_096, 100, u32::MAX));
        let info = Arc::new(SkeyListInfo::new());

        let mut skeys: Vec<u64> = (0..500).map(|i| i * 7 + 3).collect();
        let mut rng = StdRng::seed_from_u64(1234);
        skeys.shuffle(&mut rng);
        for &skey in &skeys {
            put(&writer, &info, skey, skey as u32, skey * 2);
        }
        assert_ne!(info.block_header(), INVALID_OFFSET, "skip list expected");

        let live: std::collections::BTreeSet<u64> = skeys.iter().copied().collect();

        // Probe every inserted key and its (absent) neighbor, in ascending
        // order — the resumable cursor requires non-decreasing targets.
        let mut iter = BuildingSkeyIterator::new(Arc::clone(&writer), Arc::clone(&info));
        for &skey in live.iter() {
            assert!(
                iter.move_to_skey(skey),
                "seek must hit inserted skey {skey}"
            );
            assert_eq!(iter.skey(), skey);
            assert_eq!(iter.value_offset(), skey * 2);

            let miss = skey + 1;
            if !live.contains(&miss) {
                assert!(!iter.move_to_skey(miss), "seek must miss {miss}");
            }
        }
    }

    #[test]
    fn max_link_step_refuses_new_keys_but_not_replaces() {
        let writer = Arc::new(build_writer(256, 100, 10));
        let info = Arc::new(SkeyListInfo::new());

        for skey in 0..15u64 {
            put(&writer, &info, skey, 1, skey);
        }
        assert_eq!(info.count(), 10, "cap must hold the list at 10 keys");

        let walked = collect(&writer, &info);
        assert_eq!(
            walked.iter().map(|r| r.0).collect::<Vec<_>>(),
            (0..10u64).collect::<Vec<_>>(),
            "the first 10 keys stay, later ones are ignored"
        );

        // Replacing and deleting existing keys stays unrestricted.
        put(&writer, &info, 4, 9, 4_444);
        delete_skey(&writer, &info, 7, 9);

        let walked = collect(&writer, &info);
        assert_eq!(info.count(), 10);
        assert_eq!(walked[4], (4, false, 9, 4_444));
        assert!(walked[7].1, "skey 7 must be tombstoned");
    }

    #[test]
    fn full_arena_refuses_append_and_link() {
        let writer = build_writer(4, 100, u32::MAX);
        let info = SkeyListInfo::new();

        for skey in 0..4u64 {
            let offset = writer
                .append(skey, 0, UNINITIALIZED_EXPIRE_TIME, skey)
                .expect("room for 4 nodes");
            assert!(writer.link_skey_node(&info, offset));
        }

        assert!(writer.is_full());
        assert!(
            writer
                .append(99, 0, UNINITIALIZED_EXPIRE_TIME, 99)
                .is_none(),
            "full arena must refuse appends"
        );
        // Offset 0 is long linked; a full writer refuses even re-links.
        assert!(!writer.link_skey_node(&info, 0));
    }

    #[test]
    fn interleaved_inserts_replaces_and_deletes_keep_order() {
        let writer = Arc::new(build_writer(8_192, 100, u32::MAX));
        let info = Arc::new(SkeyListInfo::new());
        let mut rng = StdRng::seed_from_u64(99);

        let mut live = std::collections::BTreeMap::new();
        let mut ops: Vec<u64> = (0..400).collect();
        ops.shuffle(&mut rng);

        for (step, skey) in ops.iter().enumerate() {
            let skey = *skey % 120;
            match step % 3 {
                0 | 1 => {
                    put(&writer, &info, skey, step as u32, step as u64);
                    live.insert(skey, (false, step as u32, step as u64));
                }
                _ => {
                    delete_skey(&writer, &info, skey, step as u32);
                    live.insert(skey, (true, step as u32, u64::MAX));
                }
            }
        }

        let walked = collect(&writer, &info);
        assert_eq!(walked.len(), live.len());
        assert_eq!(info.count() as usize, live.len());

        for ((walked_skey, deleted, ts, _), (live_skey, (live_deleted, live_ts, _))) in
            walked.iter().zip(live.iter())
        {
            assert_eq!(walked_skey, live_skey);
            assert_eq!(deleted, live_deleted);
            assert_eq!(ts, live_ts);
        }
    }
}

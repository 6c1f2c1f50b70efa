//! # KKV Store
//!
//! Write path of a key-to-multiple-values (KKV) storage engine: for one
//! prefix key (`pkey`), an unbounded, mutable, **ordered** set of suffix-key
//! (`skey`) records, each pointing at a value blob, with point deletes of a
//! single suffix key or a whole prefix key.
//!
//! The engine is built around append-only node arenas addressed by integer
//! offsets instead of pointers, with a lazily-built skip list per prefix key
//! once a suffix-key list grows long. One writer thread builds a segment;
//! readers iterate it concurrently through published offsets; a sealed
//! segment is dumped to disk through an abstract sink; on-disk segments are
//! N-way merged with TTL and tombstone-dropping policy.
//!
//! Lifecycle: **build** ([`KkvMemIndexer`]) → **dump** ([`KkvIndexDumper`])
//! → **merge** ([`KkvMerger`]).
//!
//! ```
//! use kkv_store::{Document, KkvIndexConfig, KkvMemIndexer};
//!
//! let mut indexer: KkvMemIndexer<u64> =
//!     KkvMemIndexer::new(KkvIndexConfig::default()).unwrap();
//!
//! let batch = vec![
//!     Document::add(0xfeed, 7, 1_700_000_000_000, b"first".to_vec()),
//!     Document::add(0xfeed, 3, 1_700_000_001_000, b"second".to_vec()),
//! ];
//! indexer.build(&batch).unwrap();
//!
//! let mut iter = indexer.create_skey_iterator(0xfeed).unwrap();
//! assert_eq!(iter.skey(), 3); // ascending suffix-key order
//! iter.move_to_next();
//! assert_eq!(iter.skey(), 7);
//! ```

pub mod kkv_engine;

pub use kkv_engine::{
    ArenaValueWriter, BuildingSkeyIterator, ChainedPkeyTable, DensePkeyTable, DocOperation,
    Document, DumpEstimateInput, DumpLayoutHint, DumpMode, DumpSink, KkvIndexConfig,
    KkvIndexDumper, KkvMemIndexer, KkvMerger, MergeParams, MultiSegmentIterator, PkeyCursor,
    PkeyTable, PkeyTablePolicy, PlainValueCodec, RecordFilter, SeekCursor, SegmentMergeInfo,
    SegmentMetrics, SinkDoc, SkeyListInfo, SkeyWriter, SkeyWriterOptions, Status, SuffixKey,
    ValueCodec, ValueWriter,
};

pub mod constants;

mod status;
pub use status::Status;

mod config;
pub use config::{DumpMode, KkvIndexConfig, PkeyTablePolicy};

mod suffix_key;
pub use suffix_key::SuffixKey;

mod node_arena;
pub use node_arena::NodeArena;

mod skey_node;
pub use skey_node::{ListNode, SkeyListInfo, SkeyNode};

mod skey_writer;
pub use skey_writer::{SeekCursor, SkeyWriter, SkeyWriterOptions};

mod skey_iterator;
pub use skey_iterator::BuildingSkeyIterator;

mod pkey_table;
pub use pkey_table::{ChainedPkeyTable, DensePkeyTable, PkeyTable};

mod value_writer;
pub use value_writer::{ArenaValueWriter, ValueWriter};

mod value_codec;
pub use value_codec::{PlainValueCodec, ValueCodec};

mod document;
pub use document::{DocOperation, Document};

mod mem_indexer;
pub use mem_indexer::KkvMemIndexer;

mod dump_sink;
pub use dump_sink::{DumpLayoutHint, DumpSink, SinkDoc};

mod record_filter;
pub use record_filter::RecordFilter;

mod index_dumper;
pub use index_dumper::{DumpEstimateInput, KkvIndexDumper};

mod segment_cursor;
pub use segment_cursor::{MultiSegmentIterator, PkeyCursor};

mod merger;
pub use merger::{KkvMerger, MergeParams, SegmentMergeInfo, SegmentMetrics};

pub mod digest;

pub mod file_segment;

use crate::kkv_engine::constants::{
    DEFAULT_LONG_TAIL_THRESHOLD, DEFAULT_MAX_VALUE_LEN, DEFAULT_PKEY_LOAD_FACTOR,
    DEFAULT_PKEY_MEMORY_RATIO, DEFAULT_VALUE_MEMORY_RATIO,
};
use crate::kkv_engine::status::Status;

/// Hash policy for the prefix-key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkeyTablePolicy {
    /// Separate chaining (sharded concurrent map). Default.
    Chained,
    /// Closed hashing (fixed open-addressing array).
    Dense,
}

/// How the dumper walks the live structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    /// Build-time dump: sort, then stream straight out of the structure.
    Offline,
    /// Real-time dump: snapshot everything into a buffer first to minimize
    /// hold time on the live segment (bounded — real-time segments are
    /// size-capped).
    Online,
}

/// Configuration for one building segment.
///
/// Memory sizing works from one ceiling: `build_memory_bytes` is split into
/// the pkey-table share, the value-arena share, and the remainder for the
/// suffix-key arenas, per the two ratios.
#[derive(Debug, Clone)]
pub struct KkvIndexConfig {
    /// Identity of the index this segment belongs to; documents carrying a
    /// different id are skipped during build.
    pub index_id: u32,
    pub build_memory_bytes: usize,
    pub pkey_memory_ratio: f64,
    pub value_memory_ratio: f64,
    /// Suffix-key list length at which the per-pkey skip list is built.
    pub long_tail_threshold: u32,
    /// Suffix-key protection threshold: per-pkey cap on new suffix keys.
    pub max_link_step: u32,
    /// Hard ceiling on a single encoded value.
    pub max_value_len: usize,
    pub enable_ttl: bool,
    /// Segment-level TTL, seconds. Only read when `enable_ttl` is set.
    pub ttl_secs: u32,
    /// Accept add-documents without a suffix key (stored under skey 0).
    /// Off by default: a missing suffix key is almost always a feed bug.
    pub allow_implicit_skey: bool,
    pub dump_mode: DumpMode,
    pub pkey_table_policy: PkeyTablePolicy,
    /// Target load factor for the `Dense` policy.
    pub pkey_load_factor: f64,
}

impl Default for KkvIndexConfig {
    fn default() -> Self {
        Self {
            index_id: 0,
            build_memory_bytes: 64 * 1024 * 1024,
            pkey_memory_ratio: DEFAULT_PKEY_MEMORY_RATIO,
            value_memory_ratio: DEFAULT_VALUE_MEMORY_RATIO,
            long_tail_threshold: DEFAULT_LONG_TAIL_THRESHOLD,
            max_link_step: u32::MAX,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            enable_ttl: false,
            ttl_secs: 0,
            allow_implicit_skey: false,
            dump_mode: DumpMode::Offline,
            pkey_table_policy: PkeyTablePolicy::Chained,
            pkey_load_factor: DEFAULT_PKEY_LOAD_FACTOR,
        }
    }
}

impl KkvIndexConfig {
    /// Fails fast on configurations that could not build a single segment.
    /// Called before any allocation or mutation.
    pub fn validate(&self) -> Result<(), Status> {
        if self.build_memory_bytes == 0 {
            return Err(Status::ConfigError("build_memory_bytes is zero".into()));
        }
        if !(self.pkey_memory_ratio > 0.0 && self.pkey_memory_ratio < 1.0) {
            return Err(Status::ConfigError(format!(
                "pkey_memory_ratio {} outside (0, 1)",
                self.pkey_memory_ratio
            )));
        }
        if !(self.value_memory_ratio > 0.0 && self.value_memory_ratio < 1.0) {
            return Err(Status::ConfigError(format!(
                "value_memory_ratio {} outside (0, 1)",
                self.value_memory_ratio
            )));
        }
        if self.pkey_memory_ratio + self.value_memory_ratio >= 1.0 {
            return Err(Status::ConfigError(
                "pkey + value ratios leave no suffix-key budget".into(),
            ));
        }
        if self.long_tail_threshold == 0 {
            return Err(Status::ConfigError("long_tail_threshold is zero".into()));
        }
        if self.max_link_step == 0 {
            return Err(Status::ConfigError("max_link_step is zero".into()));
        }
        if self.max_value_len == 0 {
            return Err(Status::ConfigError("max_value_len is zero".into()));
        }
        if self.enable_ttl && self.ttl_secs == 0 {
            return Err(Status::ConfigError("TTL enabled with ttl_secs = 0".into()));
        }
        if !(self.pkey_load_factor > 0.0 && self.pkey_load_factor < 1.0) {
            return Err(Status::ConfigError(format!(
                "pkey_load_factor {} outside (0, 1)",
                self.pkey_load_factor
            )));
        }
        Ok(())
    }

    /// Byte budget for the prefix-key table.
    pub fn pkey_table_budget(&self) -> usize {
        (self.build_memory_bytes as f64 * self.pkey_memory_ratio) as usize
    }

    /// Byte budget for the value arena.
    pub fn value_budget(&self) -> usize {
        (self.build_memory_bytes as f64 * self.value_memory_ratio) as usize
    }

    /// Byte budget left for the suffix-key node and block arenas.
    pub fn skey_budget(&self) -> usize {
        self.build_memory_bytes - self.pkey_table_budget() - self.value_budget()
    }
}

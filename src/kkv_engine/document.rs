/// Operation kind carried by a document.
///
/// The shared document model upstream of this engine knows more operations
/// than the KKV write path supports; `Update` exists so the indexer can
/// reject it explicitly instead of silently treating it as an add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocOperation {
    Add,
    Update,
    Delete,
}

/// One incoming document of a build batch.
///
/// Prefix and suffix keys arrive pre-hashed to `u64`; the suffix key is
/// optional (absent on whole-pkey deletes, and on adds only when the schema
/// allows implicit suffix keys). Timestamps arrive in milliseconds and are
/// normalized to seconds on ingest.
#[derive(Debug, Clone)]
pub struct Document {
    pub op: DocOperation,
    /// Which index this document targets; the indexer skips foreign ids.
    pub index_id: u32,
    /// Set by upstream dedup/filter stages; skipped without a status.
    pub dropped: bool,
    pub pkey_hash: u64,
    pub skey_hash: Option<u64>,
    pub timestamp_ms: i64,
    /// Per-document TTL override in seconds; segment-level TTL applies
    /// when absent.
    pub ttl_secs: Option<u32>,
    pub value: Vec<u8>,
}

impl Document {
    pub fn add(pkey_hash: u64, skey_hash: u64, timestamp_ms: i64, value: Vec<u8>) -> Self {
        Self {
            op: DocOperation::Add,
            index_id: 0,
            dropped: false,
            pkey_hash,
            skey_hash: Some(skey_hash),
            timestamp_ms,
            ttl_secs: None,
            value,
        }
    }

    /// Delete of one suffix key.
    pub fn delete_skey(pkey_hash: u64, skey_hash: u64, timestamp_ms: i64) -> Self {
        Self {
            op: DocOperation::Delete,
            index_id: 0,
            dropped: false,
            pkey_hash,
            skey_hash: Some(skey_hash),
            timestamp_ms,
            ttl_secs: None,
            value: Vec::new(),
        }
    }

    /// Delete of a whole prefix key.
    pub fn delete_pkey(pkey_hash: u64, timestamp_ms: i64) -> Self {
        Self {
            op: DocOperation::Delete,
            index_id: 0,
            dropped: false,
            pkey_hash,
            skey_hash: None,
            timestamp_ms,
            ttl_secs: None,
            value: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u32) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    pub fn with_index_id(mut self, index_id: u32) -> Self {
        self.index_id = index_id;
        self
    }

    /// Ingest timestamp normalization: milliseconds → whole seconds,
    /// clamped at zero (pre-epoch producers exist only in tests, but the
    /// stored width is unsigned).
    #[inline]
    pub fn timestamp_secs(&self) -> u32 {
        (self.timestamp_ms / 1000).max(0) as u32
    }
}

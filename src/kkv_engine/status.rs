use thiserror::Error;

/// Unified error type for every fallible operation in the engine.
///
/// Two of the variants are not really "errors": [`Status::NeedDump`] is the
/// cooperative backpressure signal raised when an arena would overflow, and
/// drives segment rotation upstream. Everything else aborts the current call.
///
/// Merge-time sink failures deliberately use this same type instead of a
/// separate unwind path, so a caller can treat every failure uniformly.
#[derive(Debug, Error)]
pub enum Status {
    /// The building segment is out of reserved memory; seal it and dump.
    /// Expected and recoverable — never surface this as a hard failure.
    #[error("building segment is full, a dump is required")]
    NeedDump,

    /// Malformed caller input (missing suffix key, bad merge parameters).
    #[error("invalid argument: {0}")]
    InvalidArgs(String),

    /// Input that violates a hard structural limit (oversized value) or a
    /// damaged on-disk record (checksum mismatch, truncated footer).
    #[error("corruption: {0}")]
    Corruption(String),

    /// Rejected configuration, detected before any mutation happens.
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A state the engine cannot recover from (unknown document op,
    /// unwritable target directory).
    #[error("internal error: {0}")]
    InternalError(String),

    /// A requested shape the engine does not support (multi-target merge).
    #[error("unimplemented: {0}")]
    Unimplement(String),
}

impl Status {
    /// `true` for the backpressure signal, which callers handle by rotating
    /// segments rather than failing the job.
    #[inline]
    pub fn is_need_dump(&self) -> bool {
        matches!(self, Status::NeedDump)
    }
}

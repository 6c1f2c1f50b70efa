use std::time::{SystemTime, UNIX_EPOCH};

use crate::kkv_engine::config::KkvIndexConfig;

/// TTL keep-predicate applied while dumping and merging.
///
/// A record passes while `now - timestamp < ttl`. Construction from a
/// config captures "now" once, so one dump/merge job applies a single
/// consistent cutoff; tests inject a fixed clock instead.
#[derive(Debug, Clone, Copy)]
pub struct RecordFilter {
    enabled: bool,
    ttl_secs: u32,
    now_secs: u32,
}

impl RecordFilter {
    /// A filter that keeps everything (TTL disabled).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl_secs: 0,
            now_secs: 0,
        }
    }

    /// A TTL filter with an explicit evaluation time.
    pub fn with_ttl(ttl_secs: u32, now_secs: u32) -> Self {
        Self {
            enabled: true,
            ttl_secs,
            now_secs,
        }
    }

    /// Filter matching a segment config, evaluated at the current wall
    /// clock.
    pub fn from_config(config: &KkvIndexConfig) -> Self {
        if !config.enable_ttl {
            return Self::disabled();
        }
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        Self::with_ttl(config.ttl_secs, now_secs)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `true` when the record dated `timestamp` is still within its TTL.
    #[inline]
    pub fn keep(&self, timestamp: u32) -> bool {
        if !self.enabled {
            return true;
        }
        self.now_secs.saturating_sub(timestamp) < self.ttl_secs
    }
}

//! Timing and scope of the background loops.
//!
//! The Index Sync Loop is the primary source of truth and polls often; the
//! Cross-Check Loop is a best-effort safety net and polls less often.

use core::time::Duration;

use podindex_primitives::TreeLayout;

/// Default minimum interval between Index Sync cycle starts (10 seconds)
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 10_000;

/// Default minimum interval between Cross-Check cycle starts (30 seconds)
pub const DEFAULT_CROSSCHECK_INTERVAL_MS: u64 = 30_000;

/// Scans log their progress every this many checked manifests
pub const DEFAULT_SCAN_PROGRESS_EVERY: usize = 500;

/// Hex digit shards plus the two densest sub-prefixes of the CocoaPods tree.
#[must_use]
pub fn default_crosscheck_prefixes() -> Vec<String> {
    "0123456789abcdef"
        .chars()
        .map(String::from)
        .chain(["1/c/3".to_owned(), "c/0/0".to_owned()])
        .collect()
}

#[derive(Clone, Copy, Debug)]
pub struct SyncConfig {
    /// Minimum interval between cycle starts
    pub interval: Duration,

    /// Structural contract used to parse tree listings
    pub layout: TreeLayout,

    /// Scanner progress logging period, in manifests
    pub progress_every: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS),
            layout: TreeLayout::default(),
            progress_every: DEFAULT_SCAN_PROGRESS_EVERY,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CrossCheckConfig {
    /// Minimum interval between cycle starts
    pub interval: Duration,

    /// Discovery-query prefixes, queried in order every cycle
    pub prefixes: Vec<String>,
}

impl Default for CrossCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_CROSSCHECK_INTERVAL_MS),
            prefixes: default_crosscheck_prefixes(),
        }
    }
}

//! Cross-Check Deprecation Loop.
//!
//! Queries a search-style discovery source for manifests that may be
//! deprecated and merges them into the Global Deprecation Set. Runs on its
//! own timer and shares nothing with the Index Sync Loop but the store.

use podindex_store::IndexStore;
use podindex_upstream::CandidateSource;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::CrossCheckConfig;
use crate::pacing::Pacer;

/// What one cross-check cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrossCheckReport {
    /// Prefixes queried successfully
    pub queried: usize,
    /// Prefixes whose query failed and was skipped
    pub failed: usize,
    /// Paths that were not yet in the Global Deprecation Set
    pub added: usize,
}

#[derive(Debug)]
pub struct CrossCheckLoop<S> {
    source: S,
    store: IndexStore,
    config: CrossCheckConfig,
}

impl<S: CandidateSource> CrossCheckLoop<S> {
    pub const fn new(source: S, store: IndexStore, config: CrossCheckConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Runs cycles until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut pacer = Pacer::new(self.config.interval);

        while pacer.ready(&cancel).await {
            let report = self.cycle(&cancel).await;

            info!(
                queried = report.queried,
                failed = report.failed,
                added = report.added,
                total = self.store.global_deprecations_len(),
                "Cross-check cycle finished"
            );
        }

        info!("Cross-check loop stopped");
    }

    /// Queries every configured prefix once, in order.
    ///
    /// A failing prefix is logged and skipped; it never stops the others.
    pub async fn cycle(&self, cancel: &CancellationToken) -> CrossCheckReport {
        let mut report = CrossCheckReport::default();

        for prefix in &self.config.prefixes {
            if cancel.is_cancelled() {
                break;
            }

            match self.source.search_candidates(prefix).await {
                Ok(found) => {
                    let total = found.len();
                    let new = self.store.merge_global_deprecations(found);

                    report.queried += 1;
                    report.added += new;

                    if new > 0 || total == 0 {
                        info!(%prefix, found = total, new, "Cross-checked deprecations");
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        %prefix,
                        kind = err.kind(),
                        error = %err,
                        "Cross-check query failed, skipping prefix this cycle"
                    );
                }
            }
        }

        report
    }
}

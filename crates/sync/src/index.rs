//! Index Sync Loop.
//!
//! Polls the shard list, fetches the trees of shards whose version marker
//! changed and installs freshly built shards into the store. Every installed
//! shard is handed to the Deprecation Scanner without waiting for it.

use std::sync::Arc;

use podindex_primitives::{Shard, TreeListing};
use podindex_store::IndexStore;
use podindex_upstream::{RemoteTreeClient, Result as UpstreamResult, ShardMarker};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::pacing::Pacer;
use crate::scanner::DeprecationScanner;

/// What one sync cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Shards listed upstream
    pub listed: usize,
    /// Shards already at the listed marker
    pub unchanged: usize,
    /// Shards replaced with a newer tree
    pub updated: usize,
    /// Tree fetches that failed; retried next cycle
    pub failed: usize,
    /// Unchanged shards whose missing deprecation list was re-enqueued
    pub rescanned: usize,
}

pub struct IndexSyncLoop<C> {
    client: Arc<C>,
    store: IndexStore,
    scanner: DeprecationScanner<C>,
    config: SyncConfig,
}

impl<C> core::fmt::Debug for IndexSyncLoop<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IndexSyncLoop")
            .field("store", &self.store)
            .field("scanner", &self.scanner)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: RemoteTreeClient + 'static> IndexSyncLoop<C> {
    pub const fn new(
        client: Arc<C>,
        store: IndexStore,
        scanner: DeprecationScanner<C>,
        config: SyncConfig,
    ) -> Self {
        Self {
            client,
            store,
            scanner,
            config,
        }
    }

    /// Runs cycles until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut pacer = Pacer::new(self.config.interval);

        while pacer.ready(&cancel).await {
            match self.cycle().await {
                Ok(report) if report.updated == 0 && report.failed == 0 => {
                    debug!(
                        listed = report.listed,
                        rescanned = report.rescanned,
                        "All shards unmodified"
                    );
                }
                Ok(report) => {
                    info!(
                        listed = report.listed,
                        updated = report.updated,
                        failed = report.failed,
                        rescanned = report.rescanned,
                        "Index sync cycle finished"
                    );
                }
                Err(err) => {
                    warn!(
                        kind = err.kind(),
                        error = %err,
                        "Failed to list shards, retrying next cycle"
                    );
                }
            }
        }

        info!("Index sync loop stopped");
    }

    /// Runs a single cycle.
    ///
    /// Fails only when the shard list itself cannot be fetched, in which
    /// case the store is left untouched.
    pub async fn cycle(&self) -> UpstreamResult<CycleReport> {
        let markers = self.client.list_shards().await?;

        let mut report = CycleReport {
            listed: markers.len(),
            ..CycleReport::default()
        };

        let mut fetches = JoinSet::new();

        for marker in markers {
            if let Some(current) = self.store.get_shard(&marker.prefix) {
                if current.version_marker() == marker.version_marker {
                    report.unchanged += 1;

                    if current.deprecations().is_none() && !self.scanner.is_active(current.prefix())
                    {
                        debug!(prefix = %current.prefix(), "Re-enqueueing deprecation scan");
                        report.rescanned += 1;
                        self.scanner.trigger(current.snapshot());
                    }

                    continue;
                }
            }

            let client = Arc::clone(&self.client);
            let _handle = fetches.spawn(async move {
                let listing = client
                    .fetch_tree(&marker.prefix, &marker.version_marker)
                    .await;
                (marker, listing)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            let (marker, listing) = match joined {
                Ok(fetched) => fetched,
                Err(err) => {
                    report.failed += 1;
                    warn!(error = %err, "Tree fetch task failed");
                    continue;
                }
            };

            match listing {
                Ok(listing) => {
                    self.install(&marker, &listing);
                    report.updated += 1;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        prefix = %marker.prefix,
                        marker = %marker.version_marker,
                        kind = err.kind(),
                        error = %err,
                        "Failed to fetch shard tree, keeping previous shard"
                    );
                }
            }
        }

        Ok(report)
    }

    fn install(&self, marker: &ShardMarker, listing: &TreeListing) {
        let (shard, rejected) = Shard::from_listing(
            &marker.prefix,
            &marker.version_marker,
            listing,
            &self.config.layout,
        );

        if let Some(first) = rejected.first() {
            warn!(
                prefix = %marker.prefix,
                rejected = rejected.len(),
                example = %first,
                "Skipped tree entries that break the registry layout"
            );
        }

        if shard.truncated() {
            warn!(
                prefix = %marker.prefix,
                marker = %marker.version_marker,
                manifests = shard.manifest_paths().len(),
                "Upstream truncated the shard tree, index is incomplete"
            );
        }

        let snapshot = shard.snapshot();

        info!(
            prefix = %marker.prefix,
            marker = %marker.version_marker,
            packages = shard.package_names().len(),
            manifests = shard.manifest_paths().len(),
            truncated = shard.truncated(),
            "Installed shard"
        );

        let _previous = self.store.replace_shard(shard);

        self.scanner.trigger(snapshot);
    }
}

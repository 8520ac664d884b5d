//! Deprecation Scanner.
//!
//! Checks every manifest of one shard snapshot for a deprecation marker and
//! attaches the sorted result to the shard it was taken from. Each manifest
//! is fetched by its own task; the fetch gate behind the client bounds how
//! many of them are in flight.
//!
//! A scan is keyed to the version marker it started with. Manifest tasks
//! give up as soon as the scan's token fires, the collector checks it before
//! accumulating every result, and the store refuses to install a result for
//! a marker that is no longer current.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use podindex_primitives::manifest::{self, Deprecation};
use podindex_primitives::ShardSnapshot;
use podindex_store::{IndexStore, Install};
use podindex_upstream::{Error as UpstreamError, RemoteTreeClient};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::ScanError;

/// Outcome of checking one manifest.
#[derive(Debug)]
enum Check {
    Deprecated(String),
    Clean,
    Failed(UpstreamError),
    Abandoned,
}

#[derive(Debug)]
struct ActiveScan {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug)]
struct Shared<C> {
    client: Arc<C>,
    store: IndexStore,
    active: DashMap<String, ActiveScan>,
    next_id: AtomicU64,
    progress_every: usize,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

pub struct DeprecationScanner<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for DeprecationScanner<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> core::fmt::Debug for DeprecationScanner<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeprecationScanner")
            .field("active", &self.shared.active.len())
            .field("progress_every", &self.shared.progress_every)
            .finish_non_exhaustive()
    }
}

impl<C: RemoteTreeClient + 'static> DeprecationScanner<C> {
    /// Scans triggered through [`Self::trigger`] are spawned on `tracker` and
    /// abandoned once `shutdown` fires.
    pub fn new(
        client: Arc<C>,
        store: IndexStore,
        progress_every: usize,
        shutdown: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                store,
                active: DashMap::new(),
                next_id: AtomicU64::new(0),
                progress_every: progress_every.max(1),
                shutdown,
                tracker,
            }),
        }
    }

    /// Whether a scan for `prefix` is currently running.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        self.shared.active.contains_key(prefix)
    }

    /// Starts a scan in the background without waiting for it.
    ///
    /// The scan is registered before this returns, so [`Self::is_active`]
    /// reports it right away.
    pub fn trigger(&self, snapshot: ShardSnapshot) {
        let (id, token) = self.register(&snapshot);
        let scanner = self.clone();

        drop(self.shared.tracker.spawn(async move {
            match scanner.execute(&snapshot, id, &token).await {
                Ok(_) | Err(ScanError::Superseded) => {}
                Err(ScanError::Upstream(err)) => {
                    warn!(
                        prefix = %snapshot.prefix,
                        marker = %snapshot.version_marker,
                        kind = err.kind(),
                        error = %err,
                        "Deprecation scan failed, will retry on a later cycle"
                    );
                }
            }
        }));
    }

    /// Runs one scan to completion and installs its result.
    ///
    /// Registering the scan cancels any older scan for the same prefix. The
    /// scan also stops when the snapshot's shard is superseded or the scanner
    /// shuts down.
    pub async fn scan(&self, snapshot: ShardSnapshot) -> Result<Install, ScanError> {
        let (id, token) = self.register(&snapshot);

        self.execute(&snapshot, id, &token).await
    }

    async fn execute(
        &self,
        snapshot: &ShardSnapshot,
        id: u64,
        token: &CancellationToken,
    ) -> Result<Install, ScanError> {
        let result = self.run(snapshot, token).await;

        let _ = self
            .shared
            .active
            .remove_if(&snapshot.prefix, |_, scan| scan.id == id);

        result
    }

    fn register(&self, snapshot: &ShardSnapshot) -> (u64, CancellationToken) {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let token = snapshot.superseded.child_token();

        let previous = self.shared.active.insert(
            snapshot.prefix.clone(),
            ActiveScan {
                id,
                token: token.clone(),
            },
        );

        if let Some(previous) = previous {
            debug!(prefix = %snapshot.prefix, "Cancelling older deprecation scan");
            previous.token.cancel();
        }

        (id, token)
    }

    fn is_cancelled(&self, token: &CancellationToken) -> bool {
        token.is_cancelled() || self.shared.shutdown.is_cancelled()
    }

    async fn run(
        &self,
        snapshot: &ShardSnapshot,
        token: &CancellationToken,
    ) -> Result<Install, ScanError> {
        let prefix = &snapshot.prefix;
        let marker = &snapshot.version_marker;
        let total = snapshot.manifest_paths.len();

        info!(%prefix, %marker, total, "Starting deprecation scan");

        let mut tasks = JoinSet::new();

        for path in snapshot.manifest_paths.iter() {
            let client = Arc::clone(&self.shared.client);
            let shutdown = self.shared.shutdown.clone();
            let token = token.clone();
            let path = path.clone();

            // Most tasks spend their life queued on the fetch gate, so the
            // token is watched until the fetch completes.
            let _handle = tasks.spawn(async move {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Check::Abandoned,
                    () = shutdown.cancelled() => Check::Abandoned,
                    checked = check(&*client, path) => checked,
                }
            });
        }

        let mut deprecations = Vec::new();
        let mut checked = 0_usize;
        let mut failed = 0_usize;
        let mut last_error = None;

        while let Some(joined) = tasks.join_next().await {
            if self.is_cancelled(token) {
                tasks.detach_all();
                info!(%prefix, %marker, checked, total, "Deprecation scan superseded");
                return Err(ScanError::Superseded);
            }

            checked += 1;

            match joined {
                Ok(Check::Deprecated(path)) => deprecations.push(path),
                Ok(Check::Clean | Check::Abandoned) => {}
                Ok(Check::Failed(err)) => {
                    failed += 1;
                    last_error = Some(err);
                }
                Err(err) => {
                    failed += 1;
                    warn!(%prefix, error = %err, "Manifest check task failed");
                }
            }

            if checked % self.shared.progress_every == 0 {
                info!(
                    %prefix,
                    %marker,
                    checked,
                    total,
                    deprecated = deprecations.len(),
                    "Deprecation scan progress"
                );
            }
        }

        if self.is_cancelled(token) {
            info!(%prefix, %marker, checked, total, "Deprecation scan superseded");
            return Err(ScanError::Superseded);
        }

        if total > 0 && failed == total {
            if let Some(err) = last_error {
                return Err(ScanError::Upstream(err));
            }
        }

        deprecations.sort_unstable();

        let found = deprecations.len();
        let install = self
            .shared
            .store
            .install_deprecations(prefix, marker, deprecations);

        match install {
            Install::Installed => {
                info!(
                    %prefix,
                    %marker,
                    total,
                    failed,
                    deprecated = found,
                    "Deprecation scan finished"
                );
            }
            Install::Stale => {
                debug!(%prefix, %marker, "Discarded deprecation scan result for stale shard");
            }
            Install::Missing => {
                warn!(%prefix, %marker, "Shard disappeared before deprecation scan finished");
            }
        }

        Ok(install)
    }
}

async fn check<C: RemoteTreeClient + ?Sized>(client: &C, path: String) -> Check {
    let raw = match client.fetch_manifest(&path).await {
        Ok(raw) => raw,
        Err(err) => {
            if matches!(err, UpstreamError::NotFound(_)) {
                debug!(%path, "Manifest vanished upstream");
            } else {
                warn!(%path, kind = err.kind(), error = %err, "Failed to fetch manifest");
            }
            return Check::Failed(err);
        }
    };

    match manifest::detect(&raw) {
        Ok(Some(Deprecation::Flag)) => Check::Deprecated(path),
        Ok(Some(Deprecation::InFavorOf(replacement))) => {
            debug!(%path, %replacement, "Manifest deprecated in favor of another");
            Check::Deprecated(path)
        }
        Ok(None) => Check::Clean,
        Err(err) => {
            debug!(%path, error = %err, "Unparseable manifest treated as not deprecated");
            Check::Clean
        }
    }
}

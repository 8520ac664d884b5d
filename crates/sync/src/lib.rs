//! Background refresh of the index.
//!
//! Two independent loops write to the shared [`IndexStore`]:
//!
//! - [`IndexSyncLoop`] keeps every shard at the upstream's current version
//!   marker and hands updated shards to the [`DeprecationScanner`].
//! - [`CrossCheckLoop`] feeds the Global Deprecation Set from a secondary
//!   discovery source.
//!
//! The loops never call each other; they only meet in the store.

use std::sync::Arc;

use podindex_store::IndexStore;
use podindex_upstream::{CandidateSource, RemoteTreeClient};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub mod config;
pub mod crosscheck;
pub mod index;
pub mod pacing;
pub mod scanner;

pub use config::{CrossCheckConfig, SyncConfig};
pub use crosscheck::{CrossCheckLoop, CrossCheckReport};
pub use index::{CycleReport, IndexSyncLoop};
pub use scanner::DeprecationScanner;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScanError {
    /// The shard moved on or a newer scan took over. Not a failure.
    #[error("scan superseded")]
    Superseded,

    #[error(transparent)]
    Upstream(#[from] podindex_upstream::Error),
}

/// Spawns the Index Sync Loop (with its scanner) and, when configured, the
/// Cross-Check Loop on `tracker`. All of them stop once `cancel` fires.
pub fn start<C>(
    client: Arc<C>,
    store: &IndexStore,
    sync: SyncConfig,
    crosscheck: Option<CrossCheckConfig>,
    cancel: &CancellationToken,
    tracker: &TaskTracker,
) where
    C: RemoteTreeClient + CandidateSource + 'static,
{
    let scanner = DeprecationScanner::new(
        Arc::clone(&client),
        store.clone(),
        sync.progress_every,
        cancel.clone(),
        tracker.clone(),
    );

    let index = IndexSyncLoop::new(Arc::clone(&client), store.clone(), scanner, sync);
    drop(tracker.spawn(index.run(cancel.clone())));

    if let Some(crosscheck) = crosscheck {
        let crosscheck = CrossCheckLoop::new(client, store.clone(), crosscheck);
        drop(tracker.spawn(crosscheck.run(cancel.clone())));
    }
}

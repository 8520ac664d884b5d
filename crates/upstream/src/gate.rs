//! Rate-limited fetch gate.
//!
//! Bounds concurrent upstream calls with two independent ceilings: one for
//! API calls (shard lists, tree listings, searches) and a much wider one for
//! manifest fetches, which fan out per scan.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use podindex_primitives::TreeListing;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{CandidateSource, Error, RemoteTreeClient, Result, ShardMarker};

pub const DEFAULT_TREE_CONCURRENCY: usize = 4;
pub const DEFAULT_MANIFEST_CONCURRENCY: usize = 50;

#[derive(Clone, Debug)]
pub struct FetchGate {
    trees: Arc<Semaphore>,
    manifests: Arc<Semaphore>,
}

impl FetchGate {
    /// Both ceilings are raised to at least one permit.
    #[must_use]
    pub fn new(tree_concurrency: usize, manifest_concurrency: usize) -> Self {
        Self {
            trees: Arc::new(Semaphore::new(tree_concurrency.max(1))),
            manifests: Arc::new(Semaphore::new(manifest_concurrency.max(1))),
        }
    }

    async fn tree_permit(&self) -> Result<SemaphorePermit<'_>> {
        self.trees
            .acquire()
            .await
            .map_err(|_| Error::UpstreamUnavailable("fetch gate closed".to_owned()))
    }

    async fn manifest_permit(&self) -> Result<SemaphorePermit<'_>> {
        self.manifests
            .acquire()
            .await
            .map_err(|_| Error::UpstreamUnavailable("fetch gate closed".to_owned()))
    }

    #[must_use]
    pub fn available_tree_permits(&self) -> usize {
        self.trees.available_permits()
    }

    #[must_use]
    pub fn available_manifest_permits(&self) -> usize {
        self.manifests.available_permits()
    }

    /// Refuses all further calls; callers waiting on a permit fail.
    pub fn close(&self) {
        self.trees.close();
        self.manifests.close();
    }
}

impl Default for FetchGate {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_CONCURRENCY, DEFAULT_MANIFEST_CONCURRENCY)
    }
}

/// A client whose calls all pass through a [`FetchGate`].
///
/// Clones share the gate, so every consumer of one upstream competes for
/// the same permits.
#[derive(Clone, Debug)]
pub struct GatedClient<C> {
    inner: C,
    gate: FetchGate,
}

impl<C> GatedClient<C> {
    pub const fn new(inner: C, gate: FetchGate) -> Self {
        Self { inner, gate }
    }

    #[must_use]
    pub const fn gate(&self) -> &FetchGate {
        &self.gate
    }

    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: RemoteTreeClient> RemoteTreeClient for GatedClient<C> {
    async fn list_shards(&self) -> Result<Vec<ShardMarker>> {
        let _permit = self.gate.tree_permit().await?;
        self.inner.list_shards().await
    }

    async fn fetch_tree(&self, prefix: &str, version_marker: &str) -> Result<TreeListing> {
        let _permit = self.gate.tree_permit().await?;
        self.inner.fetch_tree(prefix, version_marker).await
    }

    async fn fetch_manifest(&self, path: &str) -> Result<Bytes> {
        let _permit = self.gate.manifest_permit().await?;
        self.inner.fetch_manifest(path).await
    }
}

#[async_trait]
impl<C: CandidateSource> CandidateSource for GatedClient<C> {
    async fn search_candidates(&self, query_prefix: &str) -> Result<Vec<String>> {
        let _permit = self.gate.tree_permit().await?;
        self.inner.search_candidates(query_prefix).await
    }
}

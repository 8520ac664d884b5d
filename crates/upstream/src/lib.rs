//! Access to the upstream registry.
//!
//! The sync engine only depends on the [`RemoteTreeClient`] and
//! [`CandidateSource`] traits. [`GithubClient`] implements both against the
//! GitHub REST API and raw content host, and [`GatedClient`] bounds how many
//! calls are in flight at once.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use podindex_primitives::TreeListing;

pub mod error;
pub mod gate;
pub mod github;
pub mod link;

pub use error::{Error, Result};
pub use gate::{FetchGate, GatedClient};
pub use github::{GithubClient, GithubConfig};

/// A top-level shard and the upstream version marker it is at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardMarker {
    pub prefix: String,
    pub version_marker: String,
}

impl ShardMarker {
    pub fn new(prefix: impl Into<String>, version_marker: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version_marker: version_marker.into(),
        }
    }
}

#[async_trait]
pub trait RemoteTreeClient: Send + Sync {
    /// Lists top-level shards with their current version markers.
    async fn list_shards(&self) -> Result<Vec<ShardMarker>>;

    /// Fetches the full recursive listing of one shard at `version_marker`.
    async fn fetch_tree(&self, prefix: &str, version_marker: &str) -> Result<TreeListing>;

    /// Fetches the raw content of one manifest by registry path.
    async fn fetch_manifest(&self, path: &str) -> Result<Bytes>;
}

/// Secondary discovery source for manifests that may be deprecated.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn search_candidates(&self, query_prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: RemoteTreeClient + ?Sized> RemoteTreeClient for Arc<T> {
    async fn list_shards(&self) -> Result<Vec<ShardMarker>> {
        (**self).list_shards().await
    }

    async fn fetch_tree(&self, prefix: &str, version_marker: &str) -> Result<TreeListing> {
        (**self).fetch_tree(prefix, version_marker).await
    }

    async fn fetch_manifest(&self, path: &str) -> Result<Bytes> {
        (**self).fetch_manifest(path).await
    }
}

#[async_trait]
impl<T: CandidateSource + ?Sized> CandidateSource for Arc<T> {
    async fn search_candidates(&self, query_prefix: &str) -> Result<Vec<String>> {
        (**self).search_candidates(query_prefix).await
    }
}

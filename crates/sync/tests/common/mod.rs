//! Scripted in-memory upstream shared by the sync tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use podindex_primitives::{TreeLayout, TreeListing};
use podindex_store::IndexStore;
use podindex_sync::{DeprecationScanner, SyncConfig};
use podindex_upstream::{CandidateSource, Error, RemoteTreeClient, Result, ShardMarker};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub const DEPRECATED: &str = r#"{
  "name": "pkg",
  "deprecated": true
}"#;

pub const REPLACED: &str = r#"{
  "name": "pkg",
  "deprecated_in_favor_of": "NewPkg"
}"#;

pub const CLEAN: &str = r#"{
  "name": "pkg",
  "summary": "not \"deprecated\": at all"
}"#;

#[derive(Clone, Copy, Debug)]
pub enum Failure {
    Unavailable,
    RateLimited,
    NotFound,
}

impl Failure {
    fn error(self, what: &str) -> Error {
        match self {
            Self::Unavailable => Error::UpstreamUnavailable(what.to_owned()),
            Self::RateLimited => Error::RateLimited { retry_after: None },
            Self::NotFound => Error::NotFound(what.to_owned()),
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    shards: Vec<ShardMarker>,
    list_failure: Option<Failure>,
    trees: HashMap<(String, String), core::result::Result<TreeListing, Failure>>,
    manifests: HashMap<String, core::result::Result<Bytes, Failure>>,
    searches: HashMap<String, core::result::Result<Vec<String>, Failure>>,
    hold_manifests: bool,
}

/// Upstream double whose answers are scripted per call and which counts
/// every call it receives.
#[derive(Debug)]
pub struct ScriptedUpstream {
    script: Mutex<Script>,
    release: Semaphore,
    pub list_calls: AtomicUsize,
    pub tree_calls: AtomicUsize,
    pub manifest_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl Default for ScriptedUpstream {
    fn default() -> Self {
        Self {
            script: Mutex::default(),
            release: Semaphore::new(0),
            list_calls: AtomicUsize::new(0),
            tree_calls: AtomicUsize::new(0),
            manifest_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_shards(&self, shards: &[(&str, &str)]) {
        let mut script = self.script.lock();
        script.list_failure = None;
        script.shards = shards
            .iter()
            .map(|(prefix, marker)| ShardMarker::new(*prefix, *marker))
            .collect();
    }

    pub fn fail_list(&self, failure: Failure) {
        self.script.lock().list_failure = Some(failure);
    }

    /// Scripts the tree of `prefix` at `marker`. Entries are shard-relative.
    pub fn set_tree(&self, prefix: &str, marker: &str, entries: &[&str]) {
        self.set_listing(prefix, marker, false, entries);
    }

    pub fn set_listing(&self, prefix: &str, marker: &str, truncated: bool, entries: &[&str]) {
        let listing = TreeListing {
            truncated,
            entries: entries.iter().map(|e| (*e).to_owned()).collect(),
        };
        let _ = self
            .script
            .lock()
            .trees
            .insert((prefix.to_owned(), marker.to_owned()), Ok(listing));
    }

    pub fn fail_tree(&self, prefix: &str, marker: &str, failure: Failure) {
        let _ = self
            .script
            .lock()
            .trees
            .insert((prefix.to_owned(), marker.to_owned()), Err(failure));
    }

    pub fn set_manifest(&self, path: &str, content: &str) {
        let _ = self
            .script
            .lock()
            .manifests
            .insert(path.to_owned(), Ok(Bytes::copy_from_slice(content.as_bytes())));
    }

    pub fn fail_manifest(&self, path: &str, failure: Failure) {
        let _ = self
            .script
            .lock()
            .manifests
            .insert(path.to_owned(), Err(failure));
    }

    pub fn set_search(&self, prefix: &str, found: &[&str]) {
        let found = found.iter().map(|p| (*p).to_owned()).collect();
        let _ = self
            .script
            .lock()
            .searches
            .insert(prefix.to_owned(), Ok(found));
    }

    pub fn fail_search(&self, prefix: &str, failure: Failure) {
        let _ = self
            .script
            .lock()
            .searches
            .insert(prefix.to_owned(), Err(failure));
    }

    /// Manifest fetches block until [`Self::release_manifests`].
    pub fn hold_manifests(&self) {
        self.script.lock().hold_manifests = true;
    }

    pub fn release_manifests(&self) {
        self.script.lock().hold_manifests = false;
        self.release.add_permits(1 << 20);
    }

    pub fn tree_calls(&self) -> usize {
        self.tree_calls.load(Ordering::SeqCst)
    }

    pub fn manifest_calls(&self) -> usize {
        self.manifest_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteTreeClient for ScriptedUpstream {
    async fn list_shards(&self) -> Result<Vec<ShardMarker>> {
        let _ = self.list_calls.fetch_add(1, Ordering::SeqCst);

        let script = self.script.lock();
        if let Some(failure) = script.list_failure {
            return Err(failure.error("shard list"));
        }

        Ok(script.shards.clone())
    }

    async fn fetch_tree(&self, prefix: &str, version_marker: &str) -> Result<TreeListing> {
        let _ = self.tree_calls.fetch_add(1, Ordering::SeqCst);

        match self
            .script
            .lock()
            .trees
            .get(&(prefix.to_owned(), version_marker.to_owned()))
        {
            Some(Ok(listing)) => Ok(listing.clone()),
            Some(Err(failure)) => Err(failure.error(prefix)),
            None => Err(Error::NotFound(version_marker.to_owned())),
        }
    }

    async fn fetch_manifest(&self, path: &str) -> Result<Bytes> {
        let _ = self.manifest_calls.fetch_add(1, Ordering::SeqCst);

        let held = self.script.lock().hold_manifests;
        if held {
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|_| Error::UpstreamUnavailable("closed".to_owned()))?;
        }

        match self.script.lock().manifests.get(path) {
            Some(Ok(content)) => Ok(content.clone()),
            Some(Err(failure)) => Err(failure.error(path)),
            None => Err(Error::NotFound(path.to_owned())),
        }
    }
}

#[async_trait]
impl CandidateSource for ScriptedUpstream {
    async fn search_candidates(&self, query_prefix: &str) -> Result<Vec<String>> {
        let _ = self.search_calls.fetch_add(1, Ordering::SeqCst);

        match self.script.lock().searches.get(query_prefix) {
            Some(Ok(found)) => Ok(found.clone()),
            Some(Err(failure)) => Err(failure.error(query_prefix)),
            None => Ok(Vec::new()),
        }
    }
}

/// `prefix/name/version/file`, the layout used throughout the tests.
pub fn layout() -> TreeLayout {
    TreeLayout::new(3, 0, 1).unwrap()
}

pub fn sync_config() -> SyncConfig {
    SyncConfig {
        layout: layout(),
        ..SyncConfig::default()
    }
}

pub struct Harness {
    pub upstream: Arc<ScriptedUpstream>,
    pub store: IndexStore,
    pub scanner: DeprecationScanner<ScriptedUpstream>,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
}

impl Harness {
    pub fn new() -> Self {
        let upstream = ScriptedUpstream::new();
        let store = IndexStore::new();
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let scanner = DeprecationScanner::new(
            Arc::clone(&upstream),
            store.clone(),
            500,
            shutdown.clone(),
            tracker.clone(),
        );

        Self {
            upstream,
            store,
            scanner,
            shutdown,
            tracker,
        }
    }

    /// Waits for every scan triggered so far.
    pub async fn settle(&self) {
        let _ = self.tracker.close();
        self.tracker.wait().await;
        let _ = self.tracker.reopen();
    }
}

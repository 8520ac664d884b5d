//! Process-wide index state.
//!
//! Holds the Shard Store (one [`Shard`] per prefix) and the Global
//! Deprecation Set. Both are written only by the background loops and read
//! by any number of concurrent readers.
//!
//! # Thread Safety
//!
//! Shards are stored as `Arc<Shard>` in a `DashMap` and swapped as whole
//! records, so a reader holding an `Arc` always sees a complete shard and
//! the previous record stays readable until the swap. The deprecation set
//! sits behind a `parking_lot::RwLock` and only ever grows.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use podindex_primitives::{validator, Shard};
use tracing::debug;

/// Result of attaching a scan result to a shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Install {
    Installed,
    /// The shard moved to another marker or was superseded; the result was
    /// discarded.
    Stale,
    /// No shard is stored under the prefix.
    Missing,
}

#[derive(Debug, Default)]
struct Inner {
    shards: DashMap<String, Arc<Shard>>,
    deprecations: RwLock<BTreeSet<String>>,
}

/// Cheaply cloneable handle to the shared index.
#[derive(Clone, Debug, Default)]
pub struct IndexStore {
    inner: Arc<Inner>,
}

impl IndexStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get_shard(&self, prefix: &str) -> Option<Arc<Shard>> {
        self.inner
            .shards
            .get(prefix)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// All shards, ordered by prefix.
    #[must_use]
    pub fn shards(&self) -> Vec<Arc<Shard>> {
        let mut shards: Vec<_> = self
            .inner
            .shards
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        shards.sort_by(|a, b| a.prefix().cmp(b.prefix()));
        shards
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.shards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.shards.is_empty()
    }

    /// Installs `shard`, replacing any shard stored under the same prefix.
    ///
    /// The replaced shard is marked superseded so scans still running
    /// against it stop and never write back.
    pub fn replace_shard(&self, shard: Shard) -> Option<Arc<Shard>> {
        let prefix = shard.prefix().to_owned();
        let previous = self.inner.shards.insert(prefix, Arc::new(shard));

        if let Some(previous) = &previous {
            previous.supersede();
            debug!(
                prefix = %previous.prefix(),
                marker = %previous.version_marker(),
                "Superseded shard"
            );
        }

        previous
    }

    /// Attaches a deprecation list to the shard under `prefix`, provided it
    /// is still at `version_marker` and has not been superseded.
    pub fn install_deprecations(
        &self,
        prefix: &str,
        version_marker: &str,
        deprecations: Vec<String>,
    ) -> Install {
        let Some(mut entry) = self.inner.shards.get_mut(prefix) else {
            return Install::Missing;
        };

        let current = entry.value();
        if current.version_marker() != version_marker || current.is_superseded() {
            return Install::Stale;
        }

        let updated = current.with_deprecations(deprecations);
        *entry.value_mut() = Arc::new(updated);

        Install::Installed
    }

    /// Sorted, distinct package names across all shards.
    #[must_use]
    pub fn package_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();

        for entry in self.inner.shards.iter() {
            names.extend(entry.value().package_names().iter().cloned());
        }

        names.into_iter().collect()
    }

    /// Validator for [`Self::package_names`], derived from every shard's
    /// version marker. `None` while no shard is stored.
    #[must_use]
    pub fn package_names_validator(&self) -> Option<String> {
        let shards = self.shards();

        if shards.is_empty() {
            return None;
        }

        Some(validator::for_markers(
            shards
                .iter()
                .map(|shard| (shard.prefix(), shard.version_marker())),
        ))
    }

    /// Merges paths into the Global Deprecation Set and returns how many
    /// were new. The set never shrinks.
    pub fn merge_global_deprecations<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut set = self.inner.deprecations.write();

        paths
            .into_iter()
            .filter(|path| !path.is_empty())
            .filter(|path| set.insert(path.clone()))
            .count()
    }

    #[must_use]
    pub fn contains_global_deprecation(&self, path: &str) -> bool {
        self.inner.deprecations.read().contains(path)
    }

    #[must_use]
    pub fn global_deprecations_len(&self) -> usize {
        self.inner.deprecations.read().len()
    }

    /// Union of every shard's deprecation list and the Global Deprecation
    /// Set, sorted. `None` when nothing has been found yet by either source.
    #[must_use]
    pub fn deprecations(&self) -> Option<Vec<String>> {
        let mut union = self.inner.deprecations.read().clone();
        let mut any_scanned = !union.is_empty();

        for entry in self.inner.shards.iter() {
            if let Some(list) = entry.value().deprecations() {
                any_scanned = true;
                union.extend(list.iter().cloned());
            }
        }

        any_scanned.then(|| union.into_iter().collect())
    }

    /// Validator for a deprecation list returned by [`Self::deprecations`].
    #[must_use]
    pub fn deprecations_validator(deprecations: &[String]) -> String {
        validator::for_lines(deprecations)
    }
}

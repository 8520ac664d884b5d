#[cfg(test)]
#[path = "tests/shard.rs"]
mod tests;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::common::join_path;
use crate::layout::{LayoutError, TreeLayout};
use crate::validator;

/// Recursive tree listing of one shard, as returned by the upstream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeListing {
    /// The upstream could not return the full listing.
    pub truncated: bool,
    /// Shard-relative entry paths, in upstream order.
    pub entries: Vec<String>,
}

/// One partition of the registry tree, pinned to a version marker.
///
/// Shards are never mutated once installed in the store. Attaching a
/// deprecation list yields a new `Shard` sharing the same path data and
/// the same supersession token.
#[derive(Clone, Debug)]
pub struct Shard {
    prefix: String,
    version_marker: String,
    truncated: bool,
    package_names: Arc<BTreeSet<String>>,
    manifest_paths: Arc<[String]>,
    deprecations: Option<Arc<[String]>>,
    superseded: CancellationToken,
}

/// The inputs a deprecation scan needs, detached from the store.
#[derive(Clone, Debug)]
pub struct ShardSnapshot {
    pub prefix: String,
    pub version_marker: String,
    pub manifest_paths: Arc<[String]>,
    pub superseded: CancellationToken,
}

impl Shard {
    /// Builds a shard from a tree listing.
    ///
    /// Entries that break the layout contract are skipped and returned
    /// alongside the shard so the caller can report them.
    #[must_use]
    pub fn from_listing(
        prefix: &str,
        version_marker: &str,
        listing: &TreeListing,
        layout: &TreeLayout,
    ) -> (Self, Vec<LayoutError>) {
        let mut package_names = BTreeSet::new();
        let mut manifest_paths = Vec::new();
        let mut rejected = Vec::new();

        for entry in &listing.entries {
            match layout.classify(entry) {
                Ok(Some(manifest)) => {
                    let _ = package_names.insert(manifest.name.to_owned());
                    manifest_paths.push(join_path(prefix, manifest.path));
                }
                Ok(None) => {}
                Err(err) => rejected.push(err),
            }
        }

        let shard = Self {
            prefix: prefix.to_owned(),
            version_marker: version_marker.to_owned(),
            truncated: listing.truncated,
            package_names: Arc::new(package_names),
            manifest_paths: manifest_paths.into(),
            deprecations: None,
            superseded: CancellationToken::new(),
        };

        (shard, rejected)
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn version_marker(&self) -> &str {
        &self.version_marker
    }

    #[must_use]
    pub const fn truncated(&self) -> bool {
        self.truncated
    }

    #[must_use]
    pub fn package_names(&self) -> &BTreeSet<String> {
        &self.package_names
    }

    #[must_use]
    pub fn manifest_paths(&self) -> &[String] {
        &self.manifest_paths
    }

    /// Sorted deprecated manifest paths, `None` until a scan for this
    /// version marker has completed.
    #[must_use]
    pub fn deprecations(&self) -> Option<&[String]> {
        self.deprecations.as_deref()
    }

    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.superseded.is_cancelled()
    }

    /// Flags in-flight work keyed to this shard as stale.
    pub fn supersede(&self) {
        self.superseded.cancel();
    }

    /// Entity tag for this shard's served data.
    #[must_use]
    pub fn validator(&self) -> String {
        validator::quoted(&self.version_marker)
    }

    #[must_use]
    pub fn snapshot(&self) -> ShardSnapshot {
        ShardSnapshot {
            prefix: self.prefix.clone(),
            version_marker: self.version_marker.clone(),
            manifest_paths: Arc::clone(&self.manifest_paths),
            superseded: self.superseded.clone(),
        }
    }

    /// Returns a copy of this shard carrying `deprecations`.
    ///
    /// The list is sorted and deduplicated; paths that are not manifests of
    /// this shard are dropped.
    #[must_use]
    pub fn with_deprecations(&self, deprecations: Vec<String>) -> Self {
        let known: HashSet<&str> = self.manifest_paths.iter().map(String::as_str).collect();

        let mut deprecations: Vec<String> = deprecations
            .into_iter()
            .filter(|path| known.contains(path.as_str()))
            .collect();
        deprecations.sort_unstable();
        deprecations.dedup();

        Self {
            deprecations: Some(deprecations.into()),
            ..self.clone()
        }
    }

    /// Lines of `Name/version/version/...` for the manifests below `dir`.
    ///
    /// `dir` is a registry path such as `1/2/3`. Names keep the order they
    /// first appear in, versions keep upstream order.
    #[must_use]
    pub fn versions_listing(&self, dir: &str, layout: &TreeLayout) -> Vec<String> {
        let mut grouped: IndexMap<&str, Vec<&str>> = IndexMap::new();

        for path in self.manifest_paths.iter() {
            let Some(rest) = path.strip_prefix(dir) else {
                continue;
            };
            if !rest.starts_with('/') {
                continue;
            }

            let (Some(name), Some(version)) = (layout.package_name(path), layout.version(path))
            else {
                continue;
            };

            let versions = grouped.entry(name).or_default();
            if !versions.contains(&version) {
                versions.push(version);
            }
        }

        grouped
            .into_iter()
            .map(|(name, versions)| {
                let mut line = String::from(name);
                for version in versions {
                    line.push('/');
                    line.push_str(version);
                }
                line
            })
            .collect()
    }
}

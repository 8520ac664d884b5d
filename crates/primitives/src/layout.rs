#[cfg(test)]
#[path = "tests/layout.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Depth of a manifest file below a shard root in the CocoaPods Specs tree:
/// `infix/suffix/Name/version/Name.podspec.json`.
pub const DEFAULT_MANIFEST_DEPTH: usize = 5;
/// Component holding the package name in a shard-relative manifest path.
pub const DEFAULT_NAME_INDEX: usize = 2;
/// Component holding the version in a shard-relative manifest path.
pub const DEFAULT_VERSION_INDEX: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LayoutError {
    #[error("manifest depth must be greater than {max_index}, got {depth}")]
    DepthTooShallow { depth: usize, max_index: usize },

    #[error("name and version components must differ (both at {0})")]
    OverlappingComponents(usize),

    #[error("entry {path:?} is {depth} components deep, manifests live at {expected}")]
    TooDeep {
        path: String,
        depth: usize,
        expected: usize,
    },

    #[error("entry {0:?} has an empty path component")]
    EmptyComponent(String),
}

/// Structural contract of the registry tree below each shard.
///
/// Entries shallower than `manifest_depth` are directories (package and
/// version folders), entries exactly `manifest_depth` deep are manifests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLayout", into = "RawLayout")]
pub struct TreeLayout {
    manifest_depth: usize,
    name_index: usize,
    version_index: usize,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct RawLayout {
    manifest_depth: usize,
    name_index: usize,
    version_index: usize,
}

impl TryFrom<RawLayout> for TreeLayout {
    type Error = LayoutError;

    fn try_from(raw: RawLayout) -> Result<Self, Self::Error> {
        Self::new(raw.manifest_depth, raw.name_index, raw.version_index)
    }
}

impl From<TreeLayout> for RawLayout {
    fn from(layout: TreeLayout) -> Self {
        Self {
            manifest_depth: layout.manifest_depth,
            name_index: layout.name_index,
            version_index: layout.version_index,
        }
    }
}

impl Default for TreeLayout {
    fn default() -> Self {
        Self {
            manifest_depth: DEFAULT_MANIFEST_DEPTH,
            name_index: DEFAULT_NAME_INDEX,
            version_index: DEFAULT_VERSION_INDEX,
        }
    }
}

/// A validated manifest entry, borrowed from the tree listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManifestEntry<'a> {
    pub path: &'a str,
    pub name: &'a str,
    pub version: &'a str,
}

impl TreeLayout {
    pub fn new(
        manifest_depth: usize,
        name_index: usize,
        version_index: usize,
    ) -> Result<Self, LayoutError> {
        if name_index == version_index {
            return Err(LayoutError::OverlappingComponents(name_index));
        }

        let max_index = name_index.max(version_index);
        if manifest_depth <= max_index {
            return Err(LayoutError::DepthTooShallow {
                depth: manifest_depth,
                max_index,
            });
        }

        Ok(Self {
            manifest_depth,
            name_index,
            version_index,
        })
    }

    #[must_use]
    pub const fn manifest_depth(&self) -> usize {
        self.manifest_depth
    }

    /// Classifies a shard-relative tree entry.
    ///
    /// Returns `Ok(None)` for directory entries, `Ok(Some(_))` for manifests
    /// and an error for entries that break the layout contract.
    pub fn classify<'a>(&self, path: &'a str) -> Result<Option<ManifestEntry<'a>>, LayoutError> {
        let components: Vec<&str> = path.split('/').collect();
        let depth = components.len();

        if depth < self.manifest_depth {
            return Ok(None);
        }

        if depth > self.manifest_depth {
            return Err(LayoutError::TooDeep {
                path: path.to_owned(),
                depth,
                expected: self.manifest_depth,
            });
        }

        if components.iter().any(|component| component.is_empty()) {
            return Err(LayoutError::EmptyComponent(path.to_owned()));
        }

        Ok(Some(ManifestEntry {
            path,
            name: components[self.name_index],
            version: components[self.version_index],
        }))
    }

    /// Package name of a fully qualified (`prefix/...`) manifest path.
    #[must_use]
    pub fn package_name<'a>(&self, manifest_path: &'a str) -> Option<&'a str> {
        manifest_path.split('/').nth(self.name_index + 1)
    }

    /// Version of a fully qualified (`prefix/...`) manifest path.
    #[must_use]
    pub fn version<'a>(&self, manifest_path: &'a str) -> Option<&'a str> {
        manifest_path.split('/').nth(self.version_index + 1)
    }
}

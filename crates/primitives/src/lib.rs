//! Core data model shared by the podindex crates.
//!
//! - [`Shard`]: one partition of the registry tree at an exact version marker
//! - [`TreeLayout`]: the structural contract of the registry's directory tree
//! - [`manifest`]: deprecation detection on raw manifest content
//! - [`validator`]: cache validators (entity tags) for served data

pub mod common;
pub mod layout;
pub mod manifest;
pub mod shard;
pub mod validator;

pub use layout::{LayoutError, TreeLayout};
pub use shard::{Shard, ShardSnapshot, TreeListing};

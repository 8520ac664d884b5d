//! Entity tags for conditional responses.
//!
//! Shard tags are derived from the upstream version marker. Aggregate tags
//! are derived from what they describe, so equal content always yields an
//! equal tag across restarts.

#[cfg(test)]
#[path = "tests/validator.rs"]
mod tests;

use sha2::{Digest, Sha256};

/// Length of the hex digest kept in content tags.
const DIGEST_HEX_LEN: usize = 32;

#[must_use]
pub fn quoted(tag: &str) -> String {
    format!("\"{tag}\"")
}

/// Tag for a newline-joined list of lines.
#[must_use]
pub fn for_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut hasher = Sha256::new();
    let mut len = 0_usize;

    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
            len += 1;
        }
        hasher.update(line.as_ref().as_bytes());
        len += line.as_ref().len();
    }

    let digest = hex::encode(hasher.finalize());

    quoted(&format!("{len:x}-{}", &digest[..DIGEST_HEX_LEN]))
}

/// Tag for a set of `(prefix, version marker)` pairs.
///
/// Pairs are hashed in the order given; callers pass them sorted by prefix.
#[must_use]
pub fn for_markers<'a, I>(markers: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut hasher = Sha256::new();

    for (prefix, marker) in markers {
        hasher.update(prefix.as_bytes());
        hasher.update(b"=");
        hasher.update(marker.as_bytes());
        hasher.update(b";");
    }

    let digest = hex::encode(hasher.finalize());

    quoted(&digest[..DIGEST_HEX_LEN])
}

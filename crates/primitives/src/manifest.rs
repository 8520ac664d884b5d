//! Deprecation detection on raw manifest content.
//!
//! Manifests are large JSON documents and only a handful of them are
//! deprecated, so content goes through a byte-level pre-filter first and is
//! only parsed when the filter finds a deprecation key.

#[cfg(test)]
#[path = "tests/manifest.rs"]
mod tests;

use memchr::memmem;
use serde::Deserialize;
use serde_json::Value;

const KEY_STEM: &[u8] = b"\"deprecated";
const FLAG_TAIL: &[u8] = b"\":";
const IN_FAVOR_OF_TAIL: &[u8] = b"_in_favor_of\":";

/// A confirmed deprecation marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Deprecation {
    /// `"deprecated"` is set to a truthy value.
    Flag,
    /// `"deprecated_in_favor_of"` is set to a truthy value, usually the name
    /// of a replacement. Non-string values are kept as their JSON text.
    InFavorOf(String),
}

/// Only the fields deprecation detection needs; everything else in the
/// document is skipped by serde.
#[derive(Debug, Deserialize)]
struct Projection {
    #[serde(default)]
    deprecated: Option<Value>,
    #[serde(default)]
    deprecated_in_favor_of: Option<Value>,
}

/// Cheap pre-filter: does `raw` contain a whitespace-preceded
/// `"deprecated":` or `"deprecated_in_favor_of":` key?
#[must_use]
pub fn has_deprecation_key(raw: &[u8]) -> bool {
    memmem::find_iter(raw, KEY_STEM).any(|at| {
        let preceded_by_space = at
            .checked_sub(1)
            .and_then(|i| raw.get(i))
            .is_some_and(u8::is_ascii_whitespace);

        let tail = &raw[at + KEY_STEM.len()..];

        preceded_by_space && (tail.starts_with(FLAG_TAIL) || tail.starts_with(IN_FAVOR_OF_TAIL))
    })
}

/// Detects a deprecation marker in raw manifest content.
///
/// Content failing the pre-filter is never parsed.
pub fn detect(raw: &[u8]) -> Result<Option<Deprecation>, serde_json::Error> {
    if !has_deprecation_key(raw) {
        return Ok(None);
    }

    let projection: Projection = serde_json::from_slice(raw)?;

    match projection.deprecated_in_favor_of {
        Some(Value::String(replacement)) if !replacement.is_empty() => {
            return Ok(Some(Deprecation::InFavorOf(replacement)));
        }
        Some(other) if is_truthy(&other) => {
            return Ok(Some(Deprecation::InFavorOf(other.to_string())));
        }
        _ => {}
    }

    Ok(projection
        .deprecated
        .as_ref()
        .is_some_and(is_truthy)
        .then_some(Deprecation::Flag))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

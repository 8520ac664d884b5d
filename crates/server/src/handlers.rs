//! Read-only list endpoints.
//!
//! Every list carries a validator. A request whose `If-None-Match` equals
//! the current validator gets `304 Not Modified` and no body; data that has
//! not been fetched yet is reported as `404` with `Cache-Control: no-cache`.

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use podindex_store::IndexStore;
use tracing::debug;

use crate::AppState;

pub const DEPRECATED_COUNT_HEADER: HeaderName = HeaderName::from_static("x-deprecated-podspecs");

const VERSIONS_FILE_PREFIX: &str = "all_pods_versions_";
const VERSIONS_FILE_SUFFIX: &str = ".txt";

fn not_available() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
    )
        .into_response()
}

fn matches(request: &HeaderMap, validator: &str) -> bool {
    request
        .get(IF_NONE_MATCH)
        .is_some_and(|value| value.as_bytes() == validator.as_bytes())
}

/// Builds a `200` or `304` for a list identified by `validator`.
///
/// `body` is only rendered when the client's copy is stale.
fn conditional(
    state: &AppState,
    request: &HeaderMap,
    validator: &str,
    mut extra: HeaderMap,
    body: impl FnOnce() -> String,
) -> Response {
    let Ok(etag) = HeaderValue::from_str(validator) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let Ok(cache_control) = HeaderValue::from_str(&state.cache_control) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let _ = extra.insert(ETAG, etag);
    let _ = extra.insert(CACHE_CONTROL, cache_control);

    if matches(request, validator) {
        return (StatusCode::NOT_MODIFIED, extra).into_response();
    }

    (extra, body()).into_response()
}

pub async fn all_pods(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(validator) = state.store.package_names_validator() else {
        return not_available();
    };

    conditional(&state, &headers, &validator, HeaderMap::new(), || {
        state.store.package_names().join("\n")
    })
}

pub async fn deprecated_podspecs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(deprecations) = state.store.deprecations() else {
        return not_available();
    };

    let deprecations: Vec<String> = deprecations
        .iter()
        .map(|path| state.repo_path(path))
        .collect();

    let validator = IndexStore::deprecations_validator(&deprecations);

    let mut extra = HeaderMap::new();
    let _ = extra.insert(DEPRECATED_COUNT_HEADER, HeaderValue::from(deprecations.len()));

    conditional(&state, &headers, &validator, extra, || deprecations.join("\n"))
}

/// `all_pods_versions_1_2_3.txt` → `["1", "2", "3"]`
fn versions_components(file: &str) -> Option<Vec<&str>> {
    let components: Vec<&str> = file
        .strip_prefix(VERSIONS_FILE_PREFIX)?
        .strip_suffix(VERSIONS_FILE_SUFFIX)?
        .split('_')
        .collect();

    (components.len() == 3 && components.iter().all(|c| !c.is_empty())).then_some(components)
}

pub async fn versions(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(components) = versions_components(&file) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let Some(shard) = state.store.get_shard(components[0]) else {
        debug!(prefix = components[0], "Versions requested for unknown shard");
        return not_available();
    };

    let dir = components.join("/");

    conditional(&state, &headers, &shard.validator(), HeaderMap::new(), || {
        shard.versions_listing(&dir, &state.layout).join("\n")
    })
}

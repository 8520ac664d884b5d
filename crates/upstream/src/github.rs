use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use podindex_primitives::TreeListing;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::{PathSegmentsMut, Url};

use crate::{link, CandidateSource, Error, RemoteTreeClient, Result, ShardMarker};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_USER_AGENT: &str = "pods-cdn/1.0";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Results per search page; the API caps this at 100.
const SEARCH_PAGE_SIZE: u32 = 100;
/// The search API never serves more than 1000 results per query.
const MAX_SEARCH_PAGES: u32 = 10;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_raw_url")]
    pub raw_url: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_repo")]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory of the repository holding the shards.
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// API token; supplied at runtime and never written to disk.
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_raw_url() -> String {
    DEFAULT_RAW_URL.to_owned()
}

fn default_owner() -> String {
    "CocoaPods".to_owned()
}

fn default_repo() -> String {
    "Specs".to_owned()
}

fn default_branch() -> String {
    "master".to_owned()
}

fn default_root() -> String {
    "Specs".to_owned()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            owner: default_owner(),
            repo: default_repo(),
            branch: default_branch(),
            root: default_root(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            token: None,
        }
    }
}

impl GithubConfig {
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_urls(mut self, api_url: &Url, raw_url: &Url) -> Self {
        self.api_url = api_url.to_string();
        self.raw_url = raw_url.to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    sha: String,
    #[serde(default)]
    truncated: bool,
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: u64,
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    path: String,
}

/// Registry client backed by the GitHub REST API (listings, search) and the
/// raw content host (manifests).
#[derive(Clone, Debug)]
pub struct GithubClient {
    config: GithubConfig,
    api_url: Url,
    raw_url: Url,
    client: Client,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let api_url = parse_base(&config.api_url)?;
        let raw_url = parse_base(&config.raw_url)?;

        Ok(Self {
            config,
            api_url,
            raw_url,
            client,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn repo_url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        let _ = segments_mut(&mut url)?
            .extend(["repos", self.config.owner.as_str(), self.config.repo.as_str()])
            .extend(tail);
        Ok(url)
    }

    fn root_segments(&self) -> impl Iterator<Item = &str> {
        self.config.root.split('/').filter(|s| !s.is_empty())
    }

    fn manifest_url(&self, path: &str) -> Result<Url> {
        let mut url = self.raw_url.clone();
        let _ = segments_mut(&mut url)?
            .extend([
                self.config.owner.as_str(),
                self.config.repo.as_str(),
                self.config.branch.as_str(),
            ])
            .extend(self.root_segments())
            .extend(path.split('/'));
        Ok(url)
    }

    fn search_url(&self, query_prefix: &str, page: u32) -> Result<Url> {
        let mut url = self.api_url.clone();
        let _ = segments_mut(&mut url)?.extend(["search", "code"]);

        let query = format!(
            "(deprecated OR deprecated_in_favor_of) path:{}/{} language:json repo:{}/{}",
            self.config.root, query_prefix, self.config.owner, self.config.repo
        );

        let _ = url
            .query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("per_page", &SEARCH_PAGE_SIZE.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    async fn api_get(&self, url: Url) -> Result<Response> {
        let mut request = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "application/vnd.github+json");

        if let Some(token) = &self.config.token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }

        let response = request.send().await?;

        log_rate_limit(response.headers());

        check_status(&url, response)
    }

    async fn raw_get(&self, url: Url) -> Result<Response> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.config.user_agent)
            .send()
            .await?;

        check_status(&url, response)
    }

    /// Strips the repository root so search hits share the shard path space.
    fn registry_path(&self, repo_path: &str) -> String {
        let root = self.config.root.trim_matches('/');

        repo_path
            .strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(repo_path)
            .to_owned()
    }
}

#[async_trait]
impl RemoteTreeClient for GithubClient {
    async fn list_shards(&self) -> Result<Vec<ShardMarker>> {
        let mut tail = vec!["contents"];
        tail.extend(self.root_segments());
        let url = self.repo_url(&tail)?;

        let body = self.api_get(url).await?.bytes().await?;
        let entries: Vec<ContentEntry> = serde_json::from_slice(&body)?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == "dir")
            .map(|entry| ShardMarker::new(entry.name, entry.sha))
            .collect())
    }

    async fn fetch_tree(&self, prefix: &str, version_marker: &str) -> Result<TreeListing> {
        let mut url = self.repo_url(&["git", "trees", version_marker])?;
        let _ = url.query_pairs_mut().append_pair("recursive", "true");

        let body = self.api_get(url).await?.bytes().await?;
        let tree: TreeResponse = serde_json::from_slice(&body)?;

        if tree.sha != version_marker {
            debug!(
                %prefix,
                requested = %version_marker,
                served = %tree.sha,
                "Tree served under a different sha"
            );
        }

        Ok(TreeListing {
            truncated: tree.truncated,
            entries: tree.tree.into_iter().map(|entry| entry.path).collect(),
        })
    }

    async fn fetch_manifest(&self, path: &str) -> Result<Bytes> {
        let url = self.manifest_url(path)?;

        Ok(self.raw_get(url).await?.bytes().await?)
    }
}

#[async_trait]
impl CandidateSource for GithubClient {
    async fn search_candidates(&self, query_prefix: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut page = 1;

        loop {
            let url = self.search_url(query_prefix, page)?;
            let response = self.api_get(url).await?;

            let next = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(link::next_page);

            let body = response.bytes().await?;
            let result: SearchResponse = serde_json::from_slice(&body)?;

            debug!(
                %query_prefix,
                total = result.total_count,
                page,
                items = result.items.len(),
                "Search page received"
            );

            found.extend(
                result
                    .items
                    .into_iter()
                    .map(|item| self.registry_path(&item.path)),
            );

            match next {
                Some(next) if next > page && next <= MAX_SEARCH_PAGES => page = next,
                Some(_) => {
                    info!(%query_prefix, page, "Search pagination capped");
                    break;
                }
                None => break,
            }
        }

        found.sort_unstable();
        found.dedup();

        Ok(found)
    }
}

fn parse_base(url: &str) -> Result<Url> {
    Url::parse(url)
        .map_err(|err| Error::UpstreamUnavailable(format!("invalid base url {url}: {err}")))
}

fn segments_mut(url: &mut Url) -> Result<PathSegmentsMut<'_>> {
    let base = url.to_string();
    let mut segments = url
        .path_segments_mut()
        .map_err(|()| Error::UpstreamUnavailable(format!("unusable base url {base}")))?;
    let _ = segments.pop_if_empty();
    Ok(segments)
}

fn check_status(url: &Url, response: Response) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    Err(match status {
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::NotFound(url.path().to_owned())
        }
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
            retry_after: retry_after(response.headers()),
        },
        status => Error::UpstreamUnavailable(format!("{status} from {}", url.path())),
    })
}

/// Back-off hint from `retry-after`, or from `x-ratelimit-reset` once the
/// quota is exhausted.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    if let Some(secs) = header(RETRY_AFTER.as_str()).and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }

    if header("x-ratelimit-remaining") != Some("0") {
        return None;
    }

    let reset = header("x-ratelimit-reset")?.parse::<u64>().ok()?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();

    Some(Duration::from_secs(reset.saturating_sub(now)))
}

fn log_rate_limit(headers: &HeaderMap) {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    if let Some(remaining) = header("x-ratelimit-remaining") {
        debug!(
            remaining,
            limit = header("x-ratelimit-limit").unwrap_or("?"),
            reset = header("x-ratelimit-reset").unwrap_or("?"),
            resource = header("x-ratelimit-resource").unwrap_or("?"),
            "GitHub rate limit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_url_encodes_components() {
        let client = GithubClient::new(GithubConfig::default()).unwrap();

        let url = client
            .manifest_url("1/2/3/Weird Name+/1.0/Weird Name+.podspec.json")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://raw.githubusercontent.com/CocoaPods/Specs/master/Specs/1/2/3/Weird%20Name+/1.0/Weird%20Name+.podspec.json"
        );
    }

    #[test]
    fn test_search_url_carries_query() {
        let client = GithubClient::new(GithubConfig::default()).unwrap();

        let url = client.search_url("1/c/3", 2).unwrap();
        let pairs: Vec<_> = url.query_pairs().collect();

        assert_eq!(url.path(), "/search/code");
        assert_eq!(
            pairs[0].1,
            "(deprecated OR deprecated_in_favor_of) path:Specs/1/c/3 language:json repo:CocoaPods/Specs"
        );
        assert_eq!(pairs[2].1, "2");
    }

    #[test]
    fn test_registry_path_strips_root() {
        let client = GithubClient::new(GithubConfig::default()).unwrap();

        assert_eq!(
            client.registry_path("Specs/1/2/3/A/1.0/A.podspec.json"),
            "1/2/3/A/1.0/A.podspec.json"
        );
        assert_eq!(client.registry_path("Other/x.json"), "Other/x.json");
    }

    #[test]
    fn test_retry_after_prefers_header() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, "42".parse().unwrap());

        assert_eq!(retry_after(&headers), Some(Duration::from_secs(42)));
    }

    #[test]
    fn test_retry_after_absent_while_quota_remains() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", "10".parse().unwrap());
        let _ = headers.insert("x-ratelimit-reset", "1".parse().unwrap());

        assert_eq!(retry_after(&headers), None);
    }
}

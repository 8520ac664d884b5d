use core::net::SocketAddr;
use core::time::Duration;
use std::fs::{read_to_string, write};

use camino::Utf8Path;
use eyre::{Result as EyreResult, WrapErr};
use podindex_primitives::TreeLayout;
use podindex_server::config::{
    default_addrs, CachePolicy, DEFAULT_MAX_AGE_SECS, DEFAULT_STALE_WHILE_REVALIDATE_SECS,
};
use podindex_sync::config::{
    default_crosscheck_prefixes, DEFAULT_CROSSCHECK_INTERVAL_MS, DEFAULT_SYNC_INTERVAL_MS,
};
use podindex_upstream::gate::{DEFAULT_MANIFEST_CONCURRENCY, DEFAULT_TREE_CONCURRENCY};
use podindex_upstream::GithubConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub upstream: GithubConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub crosscheck: CrossCheckConfig,

    #[serde(default)]
    pub layout: TreeLayout,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    #[serde(rename = "interval_ms", with = "serde_duration")]
    pub interval: Duration,
    pub tree_concurrency: usize,
    pub manifest_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS),
            tree_concurrency: DEFAULT_TREE_CONCURRENCY,
            manifest_concurrency: DEFAULT_MANIFEST_CONCURRENCY,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossCheckConfig {
    pub enabled: bool,
    #[serde(rename = "interval_ms", with = "serde_duration")]
    pub interval: Duration,
    pub prefixes: Vec<String>,
}

impl Default for CrossCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(DEFAULT_CROSSCHECK_INTERVAL_MS),
            prefixes: default_crosscheck_prefixes(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ServerConfig {
    pub listen: Vec<SocketAddr>,
    pub max_age_secs: u64,
    pub stale_while_revalidate_secs: u64,
}

impl ServerConfig {
    #[must_use]
    pub const fn new(
        listen: Vec<SocketAddr>,
        max_age_secs: u64,
        stale_while_revalidate_secs: u64,
    ) -> Self {
        Self {
            listen,
            max_age_secs,
            stale_while_revalidate_secs,
        }
    }

    #[must_use]
    pub const fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            max_age: Duration::from_secs(self.max_age_secs),
            stale_while_revalidate: Duration::from_secs(self.stale_while_revalidate_secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(
            default_addrs(),
            DEFAULT_MAX_AGE_SECS,
            DEFAULT_STALE_WHILE_REVALIDATE_SECS,
        )
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(
        upstream: GithubConfig,
        sync: SyncConfig,
        crosscheck: CrossCheckConfig,
        layout: TreeLayout,
        server: ServerConfig,
    ) -> Self {
        Self {
            upstream,
            sync,
            crosscheck,
            layout,
            server,
        }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content).wrap_err_with(|| format!("invalid configuration in {path:?}"))
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempdir::TempDir;

    use super::*;

    fn temp_home() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new("podindex-config").unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_save_then_load() {
        let (_guard, home) = temp_home();
        assert!(!ConfigFile::exists(&home));

        let mut config = ConfigFile::default();
        config.sync.interval = Duration::from_secs(20);
        config.crosscheck.enabled = false;
        config.upstream = config.upstream.with_token(Some("secret".to_owned()));
        config.save(&home).unwrap();

        assert!(ConfigFile::exists(&home));
        let written = read_to_string(home.join(CONFIG_FILE)).unwrap();
        assert!(written.contains("interval_ms = 20000"));
        assert!(!written.contains("secret"));

        let loaded = ConfigFile::load(&home).unwrap();
        assert_eq!(loaded.sync.interval, Duration::from_secs(20));
        assert!(!loaded.crosscheck.enabled);
        assert_eq!(loaded.crosscheck.prefixes.len(), 18);
        assert_eq!(loaded.layout, TreeLayout::default());
        assert!(loaded.upstream.token.is_none());
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let config: ConfigFile = toml::from_str(
            r#"
            [sync]
            interval_ms = 5000
            tree_concurrency = 2
            manifest_concurrency = 8

            [server]
            listen = ["0.0.0.0:8080"]
            max_age_secs = 30
            stale_while_revalidate_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.interval, Duration::from_secs(5));
        assert_eq!(config.sync.manifest_concurrency, 8);
        assert_eq!(config.upstream.owner, "CocoaPods");
        assert!(config.crosscheck.enabled);
        assert_eq!(config.server.listen, ["0.0.0.0:8080".parse::<SocketAddr>().unwrap()]);
        assert_eq!(
            config.server.cache_policy().header_value(),
            "public,stale-while-revalidate=5,max-age=30,s-max-age=30"
        );
    }

    #[test]
    fn test_partial_sections_fill_in_missing_keys() {
        let config: ConfigFile = toml::from_str(
            r#"
            [sync]
            interval_ms = 5000

            [crosscheck]
            enabled = false

            [server]
            max_age_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.interval, Duration::from_secs(5));
        assert_eq!(config.sync.tree_concurrency, DEFAULT_TREE_CONCURRENCY);
        assert_eq!(config.sync.manifest_concurrency, DEFAULT_MANIFEST_CONCURRENCY);
        assert!(!config.crosscheck.enabled);
        assert_eq!(
            config.crosscheck.interval,
            Duration::from_millis(DEFAULT_CROSSCHECK_INTERVAL_MS)
        );
        assert_eq!(config.crosscheck.prefixes, default_crosscheck_prefixes());
        assert_eq!(config.server.listen, default_addrs());
        assert_eq!(config.server.max_age_secs, 120);
        assert_eq!(
            config.server.stale_while_revalidate_secs,
            DEFAULT_STALE_WHILE_REVALIDATE_SECS
        );
    }

    #[test]
    fn test_invalid_layout_is_rejected() {
        let result = toml::from_str::<ConfigFile>(
            r#"
            [layout]
            manifest_depth = 2
            name_index = 2
            version_index = 3
            "#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let (_guard, home) = temp_home();

        assert!(ConfigFile::load(&home).is_err());
    }
}

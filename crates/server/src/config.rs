use core::net::{IpAddr, Ipv4Addr, SocketAddr};
use core::time::Duration;

use podindex_primitives::TreeLayout;

pub const DEFAULT_PORT: u16 = 2529;
pub const DEFAULT_ADDRS: [IpAddr; 1] = [IpAddr::V4(Ipv4Addr::LOCALHOST)];

/// Default `max-age` and `s-max-age` of served lists (60 seconds)
pub const DEFAULT_MAX_AGE_SECS: u64 = 60;

/// Default `stale-while-revalidate` window of served lists (10 seconds)
pub const DEFAULT_STALE_WHILE_REVALIDATE_SECS: u64 = 10;

/// Freshness lifetime advertised to clients and shared caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: Duration,
    pub stale_while_revalidate: Duration,
}

impl CachePolicy {
    /// The `Cache-Control` value for a served list.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!(
            "public,stale-while-revalidate={},max-age={max_age},s-max-age={max_age}",
            self.stale_while_revalidate.as_secs(),
            max_age = self.max_age.as_secs(),
        )
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
            stale_while_revalidate: Duration::from_secs(DEFAULT_STALE_WHILE_REVALIDATE_SECS),
        }
    }
}

#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ServerConfig {
    pub listen: Vec<SocketAddr>,

    pub cache: CachePolicy,

    /// Needed to split manifest paths into package names and versions
    pub layout: TreeLayout,

    /// Repository directory the registry tree lives under (`Specs`).
    /// Deprecated manifest paths are served below it.
    pub root: String,
}

impl ServerConfig {
    #[must_use]
    pub const fn new(
        listen: Vec<SocketAddr>,
        cache: CachePolicy,
        layout: TreeLayout,
        root: String,
    ) -> Self {
        Self {
            listen,
            cache,
            layout,
            root,
        }
    }
}

#[must_use]
pub fn default_addrs() -> Vec<SocketAddr> {
    DEFAULT_ADDRS
        .into_iter()
        .map(|addr| SocketAddr::from((addr, DEFAULT_PORT)))
        .collect()
}

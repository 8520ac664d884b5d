use core::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use eyre::{bail, Result as EyreResult};
use podindex_config::ConfigFile;
use podindex_server::ServerConfig;
use podindex_store::IndexStore;
use podindex_sync::config::DEFAULT_SCAN_PROGRESS_EVERY;
use podindex_sync::{CrossCheckConfig, SyncConfig};
use podindex_upstream::{FetchGate, GatedClient, GithubClient};
use tokio::select;
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::cli::RootArgs;

/// Sync the registry and serve the index
#[derive(Debug, Parser)]
pub struct RunCommand {
    /// Access token for the upstream API
    #[arg(long, value_name = "TOKEN")]
    #[arg(env = "GH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Override the listen addresses configured in config.toml
    #[arg(long, value_name = "ADDR")]
    pub listen: Vec<SocketAddr>,
}

impl RunCommand {
    pub async fn run(self, root_args: RootArgs) -> EyreResult<()> {
        let path = root_args.home;

        if !ConfigFile::exists(&path) {
            bail!("Configuration not found in {path:?}, run `podindexd init` first");
        }

        let config = ConfigFile::load(&path)?;

        if self.token.is_none() {
            warn!("No upstream token given, requests will be subject to anonymous rate limits");
        }

        let root = config.upstream.root.clone();
        let client = GithubClient::new(config.upstream.with_token(self.token))?;
        let gate = FetchGate::new(
            config.sync.tree_concurrency,
            config.sync.manifest_concurrency,
        );
        let client = Arc::new(GatedClient::new(client, gate));

        let store = IndexStore::new();

        let sync = SyncConfig {
            interval: config.sync.interval,
            layout: config.layout,
            progress_every: DEFAULT_SCAN_PROGRESS_EVERY,
        };

        let crosscheck = config.crosscheck.enabled.then(|| CrossCheckConfig {
            interval: config.crosscheck.interval,
            prefixes: config.crosscheck.prefixes,
        });

        let listen = if self.listen.is_empty() {
            config.server.listen.clone()
        } else {
            self.listen
        };
        let server = ServerConfig::new(
            listen,
            config.server.cache_policy(),
            config.layout,
            root,
        );

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        podindex_sync::start(client, &store, sync, crosscheck, &cancel, &tracker);

        let mut server = tokio::spawn(podindex_server::start(server, store, cancel.clone()));

        let finished = select! {
            result = &mut server => Some(result),
            signal = ctrl_c() => {
                if let Err(err) = signal {
                    warn!(%err, "Failed to listen for interrupt");
                }
                info!("Shutting down");
                None
            }
        };

        cancel.cancel();
        tracker.close();
        tracker.wait().await;

        match finished {
            Some(result) => result?,
            None => server.await?,
        }
    }
}

//! Read-only HTTP surface over the index.
//!
//! Serves package names, per-directory version listings and the
//! deprecation list straight from the [`IndexStore`]. Handlers never write
//! to the store.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use eyre::WrapErr;
use podindex_primitives::common::join_path;
use podindex_primitives::TreeLayout;
use podindex_store::IndexStore;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod config;
pub mod handlers;

pub use config::{CachePolicy, ServerConfig};

#[derive(Clone, Debug)]
pub struct AppState {
    pub store: IndexStore,
    pub layout: TreeLayout,
    cache_control: Arc<str>,
    root: Arc<str>,
}

impl AppState {
    #[must_use]
    pub fn new(store: IndexStore, layout: TreeLayout, cache: CachePolicy, root: &str) -> Self {
        Self {
            store,
            layout,
            cache_control: cache.header_value().into(),
            root: root.trim_matches('/').into(),
        }
    }

    /// Repository path of a registry path, as clients fetch it from the CDN.
    #[must_use]
    pub fn repo_path(&self, path: &str) -> String {
        if self.root.is_empty() {
            return path.to_owned();
        }

        join_path(&self.root, path)
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/all_pods.txt", get(handlers::all_pods))
        .route("/deprecated_podspecs.txt", get(handlers::deprecated_podspecs))
        .route("/:file", get(handlers::versions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds every configured address and serves until `shutdown` fires.
///
/// Addresses that fail to bind are skipped as long as one other succeeds.
/// With no addresses at all this only waits for `shutdown`.
pub async fn start(
    config: ServerConfig,
    store: IndexStore,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let mut listeners = Vec::with_capacity(config.listen.len());
    let mut want_listeners = config.listen.iter().peekable();

    while let Some(addr) = want_listeners.next() {
        match TcpListener::bind(addr).await {
            Ok(listener) => listeners.push(listener),
            Err(err) => {
                if listeners.is_empty() && want_listeners.peek().is_none() {
                    return Err(err).wrap_err_with(|| format!("failed to bind {addr}"));
                }
                warn!(%addr, error = %err, "Failed to bind, skipping address");
            }
        }
    }

    if listeners.is_empty() {
        warn!("No listen addresses configured, server not started");
        shutdown.cancelled().await;

        return Ok(());
    }

    let app = create_router(AppState::new(store, config.layout, config.cache, &config.root));

    let mut set = JoinSet::new();

    for listener in listeners {
        let app = app.clone();
        let shutdown = shutdown.clone();
        let addr = listener.local_addr()?;

        info!(%addr, "Serving index");

        let _handle = set.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .wrap_err_with(|| format!("server on {addr} failed"))
        });
    }

    while let Some(result) = set.join_next().await {
        result??;
    }

    info!("Server stopped");

    Ok(())
}

//! # garden-stock-feed
//!
//! Keeps a live connection to the Grow a Garden stock feed and serves the latest snapshot
//! and the scraped fruit database over HTTP.
//!
//! ```bash
//! # Defaults: wss://ws.growagardenpro.com/, port 11560, /api/v1
//! garden-stock-feed
//!
//! # Overrides from flags or the environment
//! GARDEN_PORT=8080 garden-stock-feed --max-retries 10 --expect-pong
//! ```

use std::sync::Arc;

use clap::Parser as _;
use garden_stock_feed::Result;
use garden_stock_feed::cache::SnapshotCache;
use garden_stock_feed::feed::FeedConsumer;
use garden_stock_feed::fruits::{FruitDatabase, FruitRefresher};
use garden_stock_feed::server::{AppState, Cli, create_router};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(endpoint = %cli.endpoint, "Starting garden-stock-feed");

    let cache = Arc::new(SnapshotCache::new());
    if let Err(e) = cache.restore_from(&cli.stock_cache).await {
        tracing::warn!(
            path = %cli.stock_cache.display(),
            error = %e,
            "Ignoring unreadable stock snapshot"
        );
    }
    let fruits = Arc::new(FruitDatabase::load(&cli.fruit_db).await?);

    let consumer = FeedConsumer::start(cli.connection_config(), Arc::clone(&cache))?;
    let refresher = FruitRefresher::new(&cli.fruit_url, Arc::clone(&fruits))?;
    let refresh = consumer.spawn_refresh(cli.fruit_refresh_period(), Arc::new(refresher));
    let persist = consumer.spawn_persist(cli.stock_cache.clone());

    let state = AppState::new(cache, fruits).with_connection(consumer.connection().clone());
    let app = create_router(state, cli.api_version);

    let addr = cli.listen_addr();
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, api_version = cli.api_version, "Listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    consumer.shutdown();
    consumer.join().await;
    _ = refresh.await;
    _ = persist.await;

    tracing::info!("Stopped");
    Ok(served?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received");
}

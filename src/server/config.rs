use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::DEFAULT_FEED_ENDPOINT;
use crate::fruits::DEFAULT_FRUIT_URL;
use crate::ws::ConnectionConfig;
use crate::ws::config::DEFAULT_PING_PAYLOAD;

/// Live Grow a Garden stock feed with an HTTP query API
#[non_exhaustive]
#[derive(Parser, Debug, Clone)]
#[command(name = "garden-stock-feed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Upstream WebSocket feed
    #[arg(long, env = "GARDEN_FEED_ENDPOINT", default_value = DEFAULT_FEED_ENDPOINT)]
    pub endpoint: String,

    /// HTTP port to listen on
    #[arg(long, env = "GARDEN_PORT", default_value_t = 11560)]
    pub port: u16,

    /// Version segment of the `/api/v{n}` prefix
    #[arg(long, env = "GARDEN_API_VERSION", default_value_t = 1)]
    pub api_version: u32,

    /// Fixed delay before each reconnect attempt
    #[arg(long, env = "GARDEN_RECONNECT_INTERVAL_MS", default_value_t = 5_000)]
    pub reconnect_interval_ms: u64,

    /// Give up after this many consecutive failed reconnects. Unbounded when omitted
    #[arg(long, env = "GARDEN_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    #[arg(
        long,
        env = "GARDEN_HEARTBEAT_INTERVAL_MS",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub heartbeat_interval_ms: u64,

    /// How long to wait for the heartbeat reply
    #[arg(long, env = "GARDEN_HEARTBEAT_TIMEOUT_MS", default_value_t = 4_000)]
    pub heartbeat_timeout_ms: u64,

    #[arg(long, env = "GARDEN_PING_PAYLOAD", default_value = DEFAULT_PING_PAYLOAD)]
    pub ping_payload: String,

    /// Close and reconnect when a heartbeat goes unanswered
    #[arg(long, env = "GARDEN_EXPECT_PONG")]
    pub expect_pong: bool,

    /// Crop listing scraped into the fruit database
    #[arg(long, env = "GARDEN_FRUIT_URL", default_value = DEFAULT_FRUIT_URL)]
    pub fruit_url: String,

    /// Fruit database file
    #[arg(long, env = "GARDEN_FRUIT_DB", default_value = "data/fruitDatabase.json")]
    pub fruit_db: PathBuf,

    /// Last stock snapshot, restored on start-up
    #[arg(long, env = "GARDEN_STOCK_CACHE", default_value = "data/stockCache.json")]
    pub stock_cache: PathBuf,

    #[arg(
        long,
        env = "GARDEN_FRUIT_REFRESH_HOURS",
        default_value_t = 12,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub fruit_refresh_hours: u64,
}

impl Cli {
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::builder()
            .endpoint(self.endpoint.clone())
            .reconnect_interval(Duration::from_millis(self.reconnect_interval_ms))
            .maybe_max_retries(self.max_retries)
            .heartbeat_interval(Duration::from_millis(self.heartbeat_interval_ms))
            .heartbeat_timeout(Duration::from_millis(self.heartbeat_timeout_ms))
            .ping_payload(self.ping_payload.clone())
            .expect_pong(self.expect_pong)
            .build()
    }

    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    #[must_use]
    pub fn fruit_refresh_period(&self) -> Duration {
        Duration::from_secs(self.fruit_refresh_hours.saturating_mul(60 * 60))
    }
}

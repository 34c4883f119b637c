#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;
use bon::Builder;
use url::Url;

use crate::Result;
use crate::error::Error;

const DEFAULT_RECONNECT_INTERVAL_DURATION: Duration = Duration::from_secs(3);
const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_HEARTBEAT_TIMEOUT_DURATION: Duration = Duration::from_secs(5);

/// Heartbeat payload sent when none is configured.
pub const DEFAULT_PING_PAYLOAD: &str = "__ping__";

/// Configuration for a [`ReconnectingConnection`](super::ReconnectingConnection).
///
/// Fields are only reachable through getters, so a config cannot change once built.
///
/// ```
/// use std::time::Duration;
/// use garden_stock_feed::ws::config::ConnectionConfig;
///
/// let config = ConnectionConfig::builder()
///     .endpoint("wss://ws.growagardenpro.com/")
///     .reconnect_interval(Duration::from_secs(5))
///     .expect_pong(false)
///     .build();
///
/// assert_eq!(config.ping_payload(), "__ping__");
/// assert_eq!(config.max_retries(), None);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ConnectionConfig {
    /// `ws://` or `wss://` URI of the upstream feed
    #[builder(into)]
    endpoint: String,
    /// Fixed delay between a lost connection and the next attempt
    #[builder(default = DEFAULT_RECONNECT_INTERVAL_DURATION)]
    reconnect_interval: Duration,
    /// Maximum number of reconnection attempts before giving up.
    /// `None` means infinite retries.
    max_retries: Option<u32>,
    /// Interval for sending heartbeat payloads while the connection is open
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    heartbeat_interval: Duration,
    /// Maximum time to wait for the heartbeat reply before considering the connection dead
    #[builder(default = DEFAULT_HEARTBEAT_TIMEOUT_DURATION)]
    heartbeat_timeout: Duration,
    #[builder(into, default = DEFAULT_PING_PAYLOAD.to_owned())]
    ping_payload: String,
    /// Reply that acknowledges a heartbeat. Defaults to the ping payload echoed back.
    #[builder(into)]
    pong_payload: Option<String>,
    /// Whether the server answers heartbeats. When `false` pings are advisory only.
    #[builder(default = true)]
    expect_pong: bool,
}

impl ConnectionConfig {
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    #[must_use]
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    #[must_use]
    pub fn ping_payload(&self) -> &str {
        &self.ping_payload
    }

    #[must_use]
    pub fn pong_payload(&self) -> &str {
        self.pong_payload.as_deref().unwrap_or(&self.ping_payload)
    }

    #[must_use]
    pub fn expect_pong(&self) -> bool {
        self.expect_pong
    }

    /// Whether another reconnect may be attempted after `retries` attempts.
    #[must_use]
    pub fn may_retry(&self, retries: u32) -> bool {
        self.max_retries.is_none_or(|max| retries < max)
    }

    /// The reconnect delay schedule. The delay is fixed, not exponential.
    #[must_use]
    pub fn reconnect_backoff(&self) -> Constant {
        Constant::new(self.reconnect_interval)
    }

    /// Check the settings a connection cannot run with and return the parsed endpoint.
    pub fn validate(&self) -> Result<Url> {
        if self.heartbeat_interval.is_zero() {
            return Err(Error::validation("heartbeat interval must be greater than zero"));
        }

        self.endpoint_url()
    }

    /// Upper bound for the opening handshake: one heartbeat interval plus the reply timeout.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.heartbeat_interval.saturating_add(self.heartbeat_timeout)
    }

    /// Parse the endpoint, rejecting anything that is not a WebSocket URL.
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::validation(format!(
                "endpoint scheme must be ws or wss, got {scheme}"
            ))),
        }
    }
}

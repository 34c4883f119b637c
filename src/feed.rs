//! Wiring between the live connection and the snapshot cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::cache::{Snapshot, SnapshotCache};
use crate::ws::{ConnectionConfig, Listeners, ReconnectingConnection};

/// How often reference data is refreshed when no period is configured.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(12 * 60 * 60);

/// A reference dataset that is rebuilt from scratch on a timer, independent of the live feed.
#[async_trait]
pub trait Refresh: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "reference data"
    }

    async fn refresh(&self) -> Result<()>;
}

/// Feeds every inbound message of a [`ReconnectingConnection`] into a [`SnapshotCache`].
///
/// The consumer holds no state of its own beyond the wiring. Connection failures are
/// logged and otherwise left to the connection's reconnect logic; malformed payloads are
/// dropped by the cache.
pub struct FeedConsumer {
    connection: ReconnectingConnection,
    cache: Arc<SnapshotCache>,
    /// Last accepted snapshot, for the persistence task
    latest: watch::Sender<Option<Arc<Snapshot>>>,
    shutdown: CancellationToken,
}

impl FeedConsumer {
    /// Open the feed connection with the cache-updating listeners installed.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(config: ConnectionConfig, cache: Arc<SnapshotCache>) -> Result<Self> {
        let (latest, _) = watch::channel(None);
        let listeners = Self::listeners(Arc::clone(&cache), latest.clone());
        let connection = ReconnectingConnection::open_with_listeners(config, listeners)?;

        Ok(Self {
            connection,
            cache,
            latest,
            shutdown: CancellationToken::new(),
        })
    }

    fn listeners(
        cache: Arc<SnapshotCache>,
        latest: watch::Sender<Option<Arc<Snapshot>>>,
    ) -> Listeners {
        Listeners::default()
            .on_open(|| {
                #[cfg(feature = "tracing")]
                tracing::info!("Feed connected");
            })
            .on_message(move |text| {
                let previous = cache.last_updated();
                // Malformed payloads are logged by the cache and otherwise ignored.
                if let Ok(snapshot) = cache.update(text) {
                    let since_last_message_ms = previous
                        .map(|previous| (snapshot.received_at() - previous).num_milliseconds());

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        received_at = %snapshot.received_at(),
                        since_last_message_ms,
                        "Received feed snapshot"
                    );
                    #[cfg(not(feature = "tracing"))]
                    let _ = since_last_message_ms;

                    latest.send_replace(Some(snapshot));
                }
            })
            .on_close(|reason| {
                #[cfg(feature = "tracing")]
                tracing::info!(?reason, "Feed closed");
                #[cfg(not(feature = "tracing"))]
                let _ = reason;
            })
            .on_error(|error| {
                #[cfg(feature = "tracing")]
                tracing::error!(%error, "Feed error");
                #[cfg(not(feature = "tracing"))]
                let _ = error;
            })
    }

    /// Run `refresher` now and then every `period` until [`shutdown`](Self::shutdown).
    ///
    /// A failed refresh is logged and tried again at the next tick.
    pub fn spawn_refresh(&self, period: Duration, refresher: Arc<dyn Refresh>) -> JoinHandle<()> {
        let token = self.shutdown.child_token();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let result = tokio::select! {
                    biased;

                    () = token.cancelled() => break,
                    result = refresher.refresh() => result,
                };

                match result {
                    Ok(()) => {
                        #[cfg(feature = "tracing")]
                        tracing::info!(dataset = refresher.name(), "Refreshed");
                    }
                    Err(e) => {
                        #[cfg(feature = "tracing")]
                        tracing::error!(dataset = refresher.name(), error = %e, "Refresh failed");
                        #[cfg(not(feature = "tracing"))]
                        let _ = &e;
                    }
                }
            }
        })
    }

    /// Write every accepted snapshot to `path` until [`shutdown`](Self::shutdown).
    ///
    /// Snapshots arriving while a write is in flight are coalesced, so only the newest one
    /// is written next. A snapshot still pending at shutdown is flushed before the task
    /// ends. Failed writes are logged and the task carries on.
    pub fn spawn_persist<P: Into<PathBuf>>(&self, path: P) -> JoinHandle<()> {
        let path = path.into();
        let token = self.shutdown.child_token();
        let mut latest = self.latest.subscribe();

        tokio::spawn(async move {
            loop {
                let stopping = tokio::select! {
                    biased;

                    () = token.cancelled() => true,
                    changed = latest.changed() => changed.is_err(),
                };

                if stopping && !latest.has_changed().unwrap_or(false) {
                    break;
                }

                let snapshot = latest.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    match snapshot.save(&path).await {
                        Ok(()) => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(path = %path.display(), "Saved stock snapshot");
                        }
                        Err(e) => {
                            #[cfg(feature = "tracing")]
                            tracing::error!(path = %path.display(), error = %e, "Failed to save stock snapshot");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &e;
                        }
                    }
                }

                if stopping {
                    break;
                }
            }
        })
    }

    /// Close the feed connection and stop every refresh and persistence task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.connection.close();
    }

    /// Wait for the connection task to finish.
    pub async fn join(&self) {
        self.connection.join().await;
    }

    #[must_use]
    pub fn connection(&self) -> &ReconnectingConnection {
        &self.connection
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }
}

impl Drop for FeedConsumer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::ConnectionConfig;
use super::error::WsError;
use super::heartbeat::{HeartbeatEvent, HeartbeatMonitor};
use super::listeners::{CloseReason, Listeners};
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a closing socket gets to flush its close frame.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// Attempting to connect
    Connecting,
    /// Handshake completed, heartbeat running
    Open,
    /// Explicit close in progress
    Closing,
    /// No socket. Either waiting to reconnect or permanently closed
    Closed,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// A WebSocket connection that hides transient failures behind automatic reconnection.
///
/// All socket events and timers of one connection are driven by a single background task,
/// so callbacks for the same connection never run concurrently. Failures surface only
/// through the [`Listeners`] callbacks; after a close or error the connection waits the
/// configured reconnect interval and tries again, until [`close`](Self::close) is called or
/// the retry budget is spent.
///
/// Dropping the last handle closes the connection.
///
/// # Example
///
/// ```no_run
/// use garden_stock_feed::ws::{ConnectionConfig, Listeners, ReconnectingConnection};
///
/// # async fn example() -> garden_stock_feed::Result<()> {
/// let config = ConnectionConfig::builder()
///     .endpoint("wss://ws.growagardenpro.com/")
///     .expect_pong(false)
///     .build();
///
/// let listeners = Listeners::default().on_message(|text| println!("{text}"));
/// let connection = ReconnectingConnection::open_with_listeners(config, listeners)?;
///
/// connection.on_close(|reason| println!("closed: {reason:?}"));
/// // Later...
/// connection.close();
/// connection.join().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReconnectingConnection {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<Shared>,
    /// Connection task, taken by the first caller of [`ReconnectingConnection::join`]
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl std::fmt::Debug for ReconnectingConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingConnection")
            .field("endpoint", &self.inner.shared.url.as_str())
            .field("state", &self.state())
            .field("retries", &self.retries())
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

/// State shared between the handles and the connection task.
struct Shared {
    config: ConnectionConfig,
    url: Url,
    listeners: Mutex<Listeners>,
    /// Sender for the current session only. `None` while no socket is open, so a payload
    /// can never leak from one socket onto the next.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    state_tx: watch::Sender<ConnectionState>,
    retries: AtomicU32,
    attempts: AtomicU32,
    shutdown: CancellationToken,
}

impl ReconnectingConnection {
    /// Validate the config and start connecting with no callbacks registered.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        Self::open_with_listeners(config, Listeners::default())
    }

    /// Validate the config and start connecting with `listeners` already in place, so no
    /// event can be missed between start-up and registration.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn open_with_listeners(config: ConnectionConfig, listeners: Listeners) -> Result<Self> {
        let url = config.validate()?;
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);

        let shared = Arc::new(Shared {
            config,
            url,
            listeners: Mutex::new(listeners),
            outbound: Mutex::new(None),
            state_tx,
            retries: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            shutdown: CancellationToken::new(),
        });

        let task = tokio::spawn(Arc::clone(&shared).run());

        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// Queue `payload` on the open socket.
    ///
    /// Never blocks and never fails: when the connection is not open the payload is dropped
    /// with a warning and `false` is returned.
    pub fn send<S: Into<String>>(&self, payload: S) -> bool {
        let shared = &self.inner.shared;
        let outbound = shared.outbound();

        if let Some(sender) = outbound.as_ref()
            && shared.state().is_open()
            && sender.send(payload.into()).is_ok()
        {
            return true;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(endpoint = %shared.url, "WebSocket not open, message not sent");
        false
    }

    /// Close the connection for good.
    ///
    /// Suppresses further reconnects, disarms the heartbeat and closes the socket. The
    /// cancellation is observed before any pending heartbeat or reconnect timer on the
    /// connection task, so no timer can trigger a reconnect after this returns. Calling it
    /// again has no effect.
    pub fn close(&self) {
        let shared = &self.inner.shared;
        if shared.shutdown.is_cancelled() {
            return;
        }

        if let Some(max) = shared.config.max_retries() {
            shared.retries.store(max, Ordering::Release);
        }
        shared.shutdown.cancel();
        shared.outbound().take();

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %shared.url, "WebSocket close requested");
    }

    /// Wait for the connection task to finish, after [`close`](Self::close) or once the
    /// retry budget is spent. Returns immediately if another caller already joined.
    pub async fn join(&self) {
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            _ = task.await;
        }
    }

    /// Replace the open callback.
    pub fn on_open<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.shared.listeners().set_open(Arc::new(callback));
    }

    /// Replace the message callback.
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.shared.listeners().set_message(Arc::new(callback));
    }

    /// Replace the close callback.
    pub fn on_close<F>(&self, callback: F)
    where
        F: Fn(&CloseReason) + Send + Sync + 'static,
    {
        self.inner.shared.listeners().set_close(Arc::new(callback));
    }

    /// Replace the error callback.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&WsError) + Send + Sync + 'static,
    {
        self.inner.shared.listeners().set_error(Arc::new(callback));
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.state()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state_tx.subscribe()
    }

    /// Reconnect attempts since the last successful open.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.inner.shared.retries.load(Ordering::Acquire)
    }

    /// Connection attempts made over the lifetime of this connection, including the first.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inner.shared.attempts.load(Ordering::Acquire)
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.shared.shutdown.is_cancelled()
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.shared.config
    }
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Handlers are cloned out of the lock before being invoked so a callback may replace
    // itself or any other listener.

    fn emit_open(&self) {
        let handler = self.listeners().open_handler();
        if let Some(handler) = handler {
            handler();
        }
    }

    fn emit_message(&self, text: &str) {
        let handler = self.listeners().message_handler();
        if let Some(handler) = handler {
            handler(text);
        }
    }

    fn emit_close(&self, reason: &CloseReason) {
        let handler = self.listeners().close_handler();
        if let Some(handler) = handler {
            handler(reason);
        }
    }

    fn emit_error(&self, error: &WsError) {
        let handler = self.listeners().error_handler();
        if let Some(handler) = handler {
            handler(error);
        }
    }

    /// Main connection loop with automatic reconnection.
    async fn run(self: Arc<Self>) {
        let mut backoff = self.config.reconnect_backoff();
        let handshake_timeout = self.config.handshake_timeout();

        loop {
            self.set_state(ConnectionState::Connecting);
            self.attempts.fetch_add(1, Ordering::AcqRel);

            let connected = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,
                result = timeout(handshake_timeout, connect_async(self.url.as_str())) => result,
            };

            let reason = match connected {
                Ok(Ok((ws_stream, _))) => {
                    self.retries.store(0, Ordering::Release);
                    backoff.reset();
                    self.session(ws_stream).await
                }
                Ok(Err(e)) => {
                    let error = WsError::Connection(e);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(endpoint = %self.url, error = %error, "Unable to connect");
                    self.emit_error(&error);
                    CloseReason::Error
                }
                Err(_elapsed) => {
                    let error = WsError::Timeout(handshake_timeout);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(endpoint = %self.url, error = %error, "Unable to connect");
                    self.emit_error(&error);
                    CloseReason::Error
                }
            };

            self.set_state(ConnectionState::Closed);
            self.emit_close(&reason);

            if reason == CloseReason::Requested || self.shutdown.is_cancelled() {
                break;
            }

            // Check if we should stop reconnecting
            let retries = self.retries.load(Ordering::Acquire);
            if !self.config.may_retry(retries) {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    endpoint = %self.url,
                    retries,
                    "Reconnect attempts exhausted, connection permanently closed"
                );
                break;
            }
            self.retries.store(retries.saturating_add(1), Ordering::Release);

            let delay = backoff
                .next_backoff()
                .unwrap_or_else(|| self.config.reconnect_interval());

            #[cfg(feature = "tracing")]
            tracing::info!(
                endpoint = %self.url,
                attempt = retries.saturating_add(1),
                ?delay,
                "WebSocket closed, reconnecting"
            );

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,
                () = sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Closed);

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.url, "WebSocket connection task finished");
    }

    /// Drive one open socket until it closes, returning why it closed.
    async fn session(&self, ws_stream: WsStream) -> CloseReason {
        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        *self.outbound() = Some(outbound_tx);
        self.set_state(ConnectionState::Open);

        #[cfg(feature = "tracing")]
        tracing::info!(endpoint = %self.url, "WebSocket connected");

        self.emit_open();
        let mut heartbeat = HeartbeatMonitor::start(&self.config);

        let reason = loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    self.set_state(ConnectionState::Closing);
                    heartbeat.stop();
                    break CloseReason::Requested;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.receive(&mut heartbeat, text.as_str());
                        }
                        Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                            Ok(text) => self.receive(&mut heartbeat, text),
                            Err(e) => {
                                let error = WsError::InvalidMessage(format!("binary frame is not UTF-8: {e}"));
                                #[cfg(feature = "tracing")]
                                tracing::warn!(%error, "Dropping WebSocket frame");
                                #[cfg(not(feature = "tracing"))]
                                let _ = &error;
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            break match frame {
                                Some(frame) => CloseReason::Remote {
                                    code: Some(u16::from(frame.code)),
                                    reason: frame.reason.as_str().to_owned(),
                                },
                                None => CloseReason::Remote { code: None, reason: String::new() },
                            };
                        }
                        Some(Ok(_)) => {
                            // Transport-level ping/pong is answered by tungstenite itself.
                        }
                        Some(Err(e)) => {
                            self.emit_error(&WsError::Connection(e));
                            break CloseReason::Error;
                        }
                        None => break CloseReason::Remote { code: None, reason: String::new() },
                    }
                }

                Some(text) = outbound_rx.recv() => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        self.emit_error(&WsError::Connection(e));
                        break CloseReason::Error;
                    }
                }

                event = heartbeat.next_event() => {
                    match event {
                        HeartbeatEvent::Ping => {
                            let ping = heartbeat.ping_payload().to_owned();
                            if let Err(e) = write.send(Message::Text(ping.into())).await {
                                self.emit_error(&WsError::Connection(e));
                                break CloseReason::Error;
                            }
                            heartbeat.ping_sent();
                        }
                        HeartbeatEvent::TimedOut => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                endpoint = %self.url,
                                timeout = ?self.config.heartbeat_timeout(),
                                "Heartbeat reply not received, reconnecting"
                            );
                            break CloseReason::HeartbeatTimeout;
                        }
                    }
                }
            }
        };

        self.outbound().take();
        heartbeat.stop();

        // Force the socket closed. The peer may already be gone, so errors are expected.
        let closed = timeout(CLOSE_GRACE_PERIOD, write.close()).await;
        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.url, ?reason, ?closed, "WebSocket session ended");
        #[cfg(not(feature = "tracing"))]
        let _ = &closed;

        reason
    }

    /// Consume heartbeat replies, forward everything else.
    fn receive(&self, heartbeat: &mut HeartbeatMonitor, text: &str) {
        if heartbeat.is_pong(text) {
            heartbeat.pong_received();
            #[cfg(feature = "tracing")]
            tracing::trace!(endpoint = %self.url, "Heartbeat reply received");
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(%text, "Received WebSocket text message");
        self.emit_message(text);
    }
}

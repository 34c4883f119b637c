#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Each test binary uses a different subset of the helpers"
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

pub const PING: &str = "__ping__";

/// How the mock answers heartbeat pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingMode {
    /// Echo the ping back, like the real feed
    Echo,
    /// Never answer
    Silent,
}

#[derive(Debug, Clone)]
enum Command {
    Text(String),
    Disconnect,
    Drop,
}

#[derive(Debug, Default)]
struct Stats {
    connections: AtomicUsize,
    closed: AtomicUsize,
    pings: AtomicUsize,
}

/// Mock WebSocket feed.
pub struct MockWsServer {
    addr: SocketAddr,
    /// Commands for ALL connected clients
    command_tx: broadcast::Sender<Command>,
    /// Non-heartbeat messages sent by clients
    received_rx: mpsc::UnboundedReceiver<String>,
    stats: Arc<Stats>,
}

impl MockWsServer {
    /// Start a mock feed on a random port.
    pub async fn start(mode: PingMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (command_tx, _) = broadcast::channel::<Command>(100);
        let (received_tx, received_rx) = mpsc::unbounded_channel::<String>();
        let stats = Arc::new(Stats::default());

        let broadcast_tx = command_tx.clone();
        let server_stats = Arc::clone(&stats);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                // Subscribe before the handshake so nothing sent after the client sees
                // `Open` can be missed.
                let mut command_rx = broadcast_tx.subscribe();

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                server_stats.connections.fetch_add(1, Ordering::SeqCst);

                let (mut write, mut read) = ws_stream.split();
                let received_tx = received_tx.clone();
                let stats = Arc::clone(&server_stats);

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) if text.as_str() == PING => {
                                        stats.pings.fetch_add(1, Ordering::SeqCst);
                                        if mode == PingMode::Echo
                                            && write.send(Message::Text(text)).await.is_err()
                                        {
                                            break;
                                        }
                                    }
                                    Some(Ok(Message::Text(text))) => {
                                        drop(received_tx.send(text.to_string()));
                                    }
                                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                }
                            }
                            command = command_rx.recv() => {
                                match command {
                                    Ok(Command::Text(text)) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Command::Disconnect) => {
                                        let frame = CloseFrame {
                                            code: CloseCode::Normal,
                                            reason: Utf8Bytes::from_static("bye"),
                                        };
                                        drop(write.send(Message::Close(Some(frame))).await);
                                        break;
                                    }
                                    // Ending the task drops the TCP stream without a close frame.
                                    Ok(Command::Drop) => break,
                                    Err(_) => break,
                                }
                            }
                        }
                    }

                    stats.closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            command_tx,
            received_rx,
            stats,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Send a text frame to all connected clients.
    pub fn send(&self, message: &str) {
        drop(self.command_tx.send(Command::Text(message.to_owned())));
    }

    /// Close every connected client with a normal close frame.
    pub fn disconnect_all(&self) {
        drop(self.command_tx.send(Command::Disconnect));
    }

    /// Drop every client connection without a closing handshake.
    pub fn drop_all(&self) {
        drop(self.command_tx.send(Command::Drop));
    }

    /// Receive the next non-heartbeat message sent by a client.
    pub async fn recv(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.received_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Completed handshakes so far.
    pub fn connections(&self) -> usize {
        self.stats.connections.load(Ordering::SeqCst)
    }

    /// Server-side connection tasks that have ended.
    pub fn closed(&self) -> usize {
        self.stats.closed.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.stats.pings.load(Ordering::SeqCst)
    }
}

/// An address nothing listens on.
pub async fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    format!("ws://{addr}/")
}

/// Poll `condition` every 10ms until it holds or `within` elapses.
pub async fn eventually<F: FnMut() -> bool>(within: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + within;

    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Thread-safe event recorder for listener callbacks.
#[derive(Debug, Clone)]
pub struct Recorder<T> {
    events: Arc<std::sync::Mutex<Vec<T>>>,
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            events: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> Recorder<T> {
    pub fn push(&self, event: T) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<T> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

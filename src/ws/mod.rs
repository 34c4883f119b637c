//! Resilient WebSocket client.
//!
//! # Architecture
//!
//! - [`ReconnectingConnection`]: socket lifecycle with heartbeat and fixed-interval reconnection
//! - [`HeartbeatMonitor`]: application-level ping and reply deadline for one socket session
//! - [`Listeners`]: single-slot `on_open`/`on_message`/`on_close`/`on_error` callbacks
//!
//! # Example
//!
//! ```ignore
//! let config = ConnectionConfig::builder().endpoint(endpoint).build();
//! let listeners = Listeners::default().on_message(move |text| cache.update(text));
//! let connection = ReconnectingConnection::open_with_listeners(config, listeners)?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod listeners;

pub use config::ConnectionConfig;
pub use connection::{ConnectionState, ReconnectingConnection};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use heartbeat::{HeartbeatEvent, HeartbeatMonitor};
pub use listeners::{CloseReason, Listeners};

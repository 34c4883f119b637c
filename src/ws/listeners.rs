//! Connection event callbacks.
//!
//! Each event kind has exactly one slot. Registering a callback replaces whatever was
//! registered before for that kind; there is no subscriber list.

use std::fmt;
use std::sync::Arc;

use super::error::WsError;

pub type OpenHandler = Arc<dyn Fn() + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;
pub type CloseHandler = Arc<dyn Fn(&CloseReason) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&WsError) + Send + Sync>;

/// Why a socket session ended.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the connection, or the stream ended
    Remote {
        /// Close code from the peer's close frame, if one was sent
        code: Option<u16>,
        /// Close reason from the peer's close frame
        reason: String,
    },
    /// No heartbeat reply arrived in time
    HeartbeatTimeout,
    /// A transport error was reported through `on_error` first
    Error,
    /// [`close`](super::ReconnectingConnection::close) was called
    Requested,
}

/// The single-slot callback set of a connection.
///
/// ```
/// use garden_stock_feed::ws::Listeners;
///
/// let listeners = Listeners::default()
///     .on_open(|| {})
///     .on_message(|text| assert!(!text.is_empty()));
/// ```
#[derive(Clone, Default)]
pub struct Listeners {
    on_open: Option<OpenHandler>,
    on_message: Option<MessageHandler>,
    on_close: Option<CloseHandler>,
    on_error: Option<ErrorHandler>,
}

impl Listeners {
    #[must_use]
    pub fn on_open<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_open(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.set_message(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CloseReason) + Send + Sync + 'static,
    {
        self.set_close(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WsError) + Send + Sync + 'static,
    {
        self.set_error(Arc::new(callback));
        self
    }

    pub(crate) fn set_open(&mut self, handler: OpenHandler) {
        self.on_open = Some(handler);
    }

    pub(crate) fn set_message(&mut self, handler: MessageHandler) {
        self.on_message = Some(handler);
    }

    pub(crate) fn set_close(&mut self, handler: CloseHandler) {
        self.on_close = Some(handler);
    }

    pub(crate) fn set_error(&mut self, handler: ErrorHandler) {
        self.on_error = Some(handler);
    }

    pub(crate) fn open_handler(&self) -> Option<OpenHandler> {
        self.on_open.clone()
    }

    pub(crate) fn message_handler(&self) -> Option<MessageHandler> {
        self.on_message.clone()
    }

    pub(crate) fn close_handler(&self) -> Option<CloseHandler> {
        self.on_close.clone()
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorHandler> {
        self.on_error.clone()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

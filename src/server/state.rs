use std::sync::Arc;

use crate::cache::SnapshotCache;
use crate::fruits::FruitDatabase;
use crate::ws::ReconnectingConnection;

/// Shared state handed to every handler.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: Arc<SnapshotCache>,
    pub fruits: Arc<FruitDatabase>,
    /// Feed connection reported by `/status`; absent when the server only serves a cache.
    pub connection: Option<ReconnectingConnection>,
}

impl AppState {
    #[must_use]
    pub fn new(cache: Arc<SnapshotCache>, fruits: Arc<FruitDatabase>) -> Self {
        Self {
            cache,
            fruits,
            connection: None,
        }
    }

    #[must_use]
    pub fn with_connection(mut self, connection: ReconnectingConnection) -> Self {
        self.connection = Some(connection);
        self
    }
}

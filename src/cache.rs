//! Latest-value cache for the feed.
//!
//! The cache holds exactly one [`Snapshot`], replaced wholesale by every valid message.
//! Reads are lock-free: a reader gets an [`Arc`] to whichever snapshot was current when it
//! looked, never a partially written one. Snapshots can be saved to disk and restored on
//! start-up, so queries have data before the feed delivers again.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, store};

/// Named sub-keys of the feed's `data` object.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Section {
    Seeds,
    Gear,
    Eggs,
    Cosmetics,
    Events,
    Weather,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Seeds,
        Section::Gear,
        Section::Eggs,
        Section::Cosmetics,
        Section::Events,
        Section::Weather,
    ];

    /// JSON key of this section inside `data`.
    #[must_use]
    pub fn key(self) -> &'static str {
        self.into()
    }
}

/// One fully parsed feed payload and the time it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    payload: Value,
    received_at: DateTime<Utc>,
}

impl Snapshot {
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            received_at: Utc::now(),
        }
    }

    /// Parse a raw feed frame.
    pub fn parse(raw: &str) -> Result<Self> {
        let payload = serde_json::from_str(raw)?;
        Ok(Self::new(payload))
    }

    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The `data` object of the payload. `null` counts as absent.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.payload.get("data").filter(|value| !value.is_null())
    }

    /// One section of `data`. `null` counts as absent.
    #[must_use]
    pub fn section(&self, section: Section) -> Option<&Value> {
        self.data()?
            .get(section.key())
            .filter(|value| !value.is_null())
    }

    /// Read a snapshot written by [`save`](Self::save). A missing file reads as `None`.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        store::read_json(path).await
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        store::write_json(path, self).await
    }
}

/// Holds the most recent [`Snapshot`] for concurrent readers.
///
/// Intended for a single writer (the feed consumer) and any number of readers.
#[derive(Debug)]
pub struct SnapshotCache {
    current: ArcSwapOption<Snapshot>,
    updates: AtomicU64,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            updates: AtomicU64::new(0),
        }
    }

    /// Parse `raw` and make it the current snapshot.
    ///
    /// A payload that does not parse is dropped and the previous snapshot stays in place.
    pub fn update(&self, raw: &str) -> Result<Arc<Snapshot>> {
        let snapshot = Snapshot::parse(raw).inspect_err(|e| {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, len = raw.len(), "Dropping malformed feed payload");
            #[cfg(not(feature = "tracing"))]
            let _ = e;
        })?;

        Ok(self.replace(snapshot))
    }

    /// Make an already parsed snapshot current.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        self.updates.fetch_add(1, Ordering::AcqRel);
        snapshot
    }

    /// Seed the cache with a snapshot from an earlier run.
    ///
    /// Unlike [`replace`](Self::replace) this does not count as an update.
    pub fn restore(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// Restore the snapshot saved at `path`. Returns whether one was found.
    pub async fn restore_from(&self, path: &Path) -> Result<bool> {
        let Some(snapshot) = Snapshot::load(path).await? else {
            return Ok(false);
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %path.display(),
            received_at = %snapshot.received_at(),
            "Restored stock snapshot"
        );

        self.restore(snapshot);
        Ok(true)
    }

    /// The current snapshot, or `None` if nothing has been received yet.
    #[must_use]
    pub fn read(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.current
            .load()
            .as_ref()
            .map(|snapshot| snapshot.received_at())
    }

    /// Number of snapshots accepted so far.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }
}

//! TTL cache of loaded snapshots.
//!
//! Entries are keyed by the source only; filters always run in memory on
//! the cached snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::db::{Database, DbResult};
use crate::models::Snapshot;

/// Anything a snapshot can be loaded from.
pub trait SnapshotSource {
    /// Stable identity of the source, used as the cache key.
    fn source_key(&self) -> &str;

    fn load_snapshot(&self) -> DbResult<Snapshot>;
}

impl SnapshotSource for Database {
    fn source_key(&self) -> &str {
        Database::source_key(self)
    }

    fn load_snapshot(&self) -> DbResult<Snapshot> {
        Database::load_snapshot(self)
    }
}

pub struct SnapshotCache {
    ttl: Duration,
    entries: HashMap<String, (Arc<Snapshot>, Instant)>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached snapshot for `source`, loading it when absent or expired.
    pub fn get_or_load<S: SnapshotSource + ?Sized>(&mut self, source: &S) -> DbResult<Arc<Snapshot>> {
        self.get_or_load_at(source, Instant::now())
    }

    /// Same as [`get_or_load`](Self::get_or_load) with an explicit clock.
    pub fn get_or_load_at<S: SnapshotSource + ?Sized>(
        &mut self,
        source: &S,
        now: Instant,
    ) -> DbResult<Arc<Snapshot>> {
        let key = source.source_key();
        if let Some((snapshot, loaded_at)) = self.entries.get(key) {
            if now.saturating_duration_since(*loaded_at) < self.ttl {
                return Ok(Arc::clone(snapshot));
            }
        }

        let snapshot = Arc::new(source.load_snapshot()?);
        tracing::debug!(source = key, "snapshot loaded");
        self.entries
            .insert(key.to_string(), (Arc::clone(&snapshot), now));
        Ok(snapshot)
    }

    /// Drop the entry for a source. Returns whether one was cached.
    pub fn invalidate(&mut self, source_key: &str) -> bool {
        self.entries.remove(source_key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

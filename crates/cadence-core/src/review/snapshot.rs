//! Snapshot Cache
//!
//! Replaying a long history on every review is wasteful, so the last folded
//! state is cached per item, tagged with the id of the last record it folded.
//! A snapshot is only served while that record is still the head of the
//! item's (non-deleted) history. Appending a review or retracting one moves
//! the head and the stale snapshot is ignored, so the cache can never serve a
//! state the replayer would not produce.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::replay::HistoryReplayer;
use crate::error::Result;
use crate::memory::{ReviewRecord, ScheduledState};

/// Default number of items kept in memory
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 1024;

/// A cached fold result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub scheduled: ScheduledState,
    /// Id of the last record folded into `scheduled`
    pub last_record_id: Uuid,
    /// Number of records folded
    pub review_count: usize,
}

impl Snapshot {
    /// Whether this snapshot was built from a history ending in `head`
    pub fn matches_head(&self, head: Option<&ReviewRecord>) -> bool {
        head.is_some_and(|record| record.id == self.last_record_id)
    }
}

/// Bounded, thread-safe snapshot cache keyed by item id
pub struct SnapshotCache {
    entries: Mutex<LruCache<Uuid, Snapshot>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}

impl SnapshotCache {
    /// Create a cache holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached state for `item_id`, if it was built from a history ending in `head`
    pub fn get(&self, item_id: Uuid, head: Option<&ReviewRecord>) -> Option<ScheduledState> {
        let mut entries = self.entries.lock().ok()?;
        let snapshot = entries.get(&item_id)?;
        if snapshot.matches_head(head) {
            Some(snapshot.scheduled)
        } else {
            None
        }
    }

    pub fn insert(&self, item_id: Uuid, snapshot: Snapshot) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(item_id, snapshot);
        }
    }

    pub fn invalidate(&self, item_id: Uuid) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(&item_id);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// State for an item: from the cache if the head still matches, otherwise
    /// replayed and cached.
    pub fn resolve(
        &self,
        replayer: &HistoryReplayer<'_>,
        item_id: Uuid,
        history: &[ReviewRecord],
    ) -> Result<Option<ScheduledState>> {
        let head = history.last();
        if let Some(hit) = self.get(item_id, head) {
            tracing::trace!(%item_id, "Snapshot hit");
            return Ok(Some(hit));
        }

        let replayed = replayer.replay(history)?;
        match (replayed, head) {
            (Some(scheduled), Some(head)) => {
                tracing::trace!(%item_id, reviews = history.len(), "Snapshot rebuilt from history");
                self.insert(
                    item_id,
                    Snapshot {
                        scheduled,
                        last_record_id: head.id,
                        review_count: history.len(),
                    },
                );
            }
            _ => self.invalidate(item_id),
        }
        Ok(replayed)
    }

    /// Whether the cached state for an item agrees with a fresh replay.
    ///
    /// Items without a matching snapshot report `true`: there is nothing
    /// cached that could have drifted.
    pub fn verify(
        &self,
        replayer: &HistoryReplayer<'_>,
        item_id: Uuid,
        history: &[ReviewRecord],
    ) -> Result<bool> {
        match self.get(item_id, history.last()) {
            Some(cached) => Ok(replayer.replay(history)? == Some(cached)),
            None => Ok(true),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

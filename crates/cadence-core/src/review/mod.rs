//! Review module - everything between a graded answer and the next due date
//!
//! - [`HistoryReplayer`]: rebuild memory state from review records
//! - [`select_due`]: what to show next, in what order
//! - [`ReviewRecorder`]: turn a score into an immutable review record
//! - [`SnapshotCache`]: skip replays while the history head is unchanged

mod due;
mod recorder;
mod replay;
mod snapshot;

pub use due::{select_due, DueItem, DueSet};
pub use recorder::{RecordedReview, ReviewRecorder};
pub use replay::{validate_history, HistoryReplayer};
pub use snapshot::{Snapshot, SnapshotCache, DEFAULT_SNAPSHOT_CAPACITY};

use std::collections::HashMap;
use std::convert::Infallible;

use uuid::Uuid;

use crate::memory::ReviewRecord;

// ============================================================================
// HISTORY PROVIDER
// ============================================================================

/// Source of review history for one item.
///
/// Implementations return the item's non-deleted records in ascending
/// `reviewed_at` order. An unknown item has an empty history. The replayer
/// re-checks ordering but trusts that deleted records were filtered out.
pub trait HistoryProvider {
    type Error;

    fn history(&self, item_id: Uuid) -> Result<Vec<ReviewRecord>, Self::Error>;
}

/// In-memory histories, mostly for tests and embedding the engine without a store
impl HistoryProvider for HashMap<Uuid, Vec<ReviewRecord>> {
    type Error = Infallible;

    fn history(&self, item_id: Uuid) -> Result<Vec<ReviewRecord>, Self::Error> {
        let mut records: Vec<ReviewRecord> = self
            .get(&item_id)
            .map(|records| records.iter().filter(|r| !r.is_deleted()).cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| r.reviewed_at);
        Ok(records)
    }
}

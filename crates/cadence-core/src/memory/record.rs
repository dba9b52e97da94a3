//! Review Record - one immutable graded review

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fsrs::Rating;

/// A single review event.
///
/// Created exactly once per review by the recorder and never mutated by the
/// engine. `next_due >= reviewed_at` always holds for records the engine
/// produces; replay rejects stored records that break it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    /// Unique identifier (UUID v4)
    pub id: Uuid,
    /// The reviewed item
    pub item_id: Uuid,
    /// Score as the user entered it, on the configured scale
    pub quality: i32,
    /// Internal tier the score mapped to; this is what replay folds
    pub rating: Rating,
    /// When the review happened
    pub reviewed_at: DateTime<Utc>,
    /// When the item is next due
    pub next_due: DateTime<Utc>,
    /// Soft-deletion timestamp (audit-trail corrections only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ReviewRecord {
    /// Scheduled interval in whole days
    pub fn interval_days(&self) -> i64 {
        (self.next_due - self.reviewed_at).num_days()
    }

    /// Whether the record has been retracted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

//! Memory module - Core types and data structures
//!
//! - Learning items and their immutable review records
//! - The per-item memory model (difficulty, stability, last review)
//! - Scheduled state: the memory model plus the due time it produced

mod item;
mod record;

pub use item::{LearningItem, NewItem};
pub use record::ReviewRecord;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// MEMORY STATE
// ============================================================================

/// Learned state of one item for one account.
///
/// Derived, never authoritative: it is a fold over the item's review records
/// (see [`crate::review::HistoryReplayer`]) or a cached copy of that fold.
/// An item without reviews has no state at all and is due immediately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// Intrinsic hardness (1.0 = easy, 10.0 = hard by default)
    pub difficulty: f64,
    /// Days until retrievability decays to the target retention
    pub stability: f64,
    /// When the item was last reviewed
    pub last_reviewed: DateTime<Utc>,
}

impl MemoryState {
    /// Fractional days between the last review and `at`, never negative
    pub fn elapsed_days(&self, at: DateTime<Utc>) -> f64 {
        let seconds = (at - self.last_reviewed).num_seconds().max(0);
        seconds as f64 / 86_400.0
    }
}

// ============================================================================
// SCHEDULED STATE
// ============================================================================

/// A memory state together with the due time of the review that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledState {
    /// Memory state after the review
    pub memory: MemoryState,
    /// When the item is next due
    pub next_due: DateTime<Utc>,
}

impl ScheduledState {
    /// Due at or before `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due <= now
    }

    /// How far past due at `now` (negative when not yet due)
    pub fn overdue_by(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.next_due
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Due-Set Selector
//!
//! Picks what to show next from a snapshot the caller already fetched.
//!
//! ## Ordering
//!
//! 1. Reviewed items whose `next_due <= now`, most overdue first (ascending
//!    `next_due`).
//! 2. Never-reviewed items, oldest created first.
//!
//! Ties fall back to `created_at`, then item id, so the order is total and
//! stable across calls. Items carrying a deletion timestamp are skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{LearningItem, ScheduledState};

/// One item selected for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueItem {
    pub item: LearningItem,
    /// `None` for items that have never been reviewed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduledState>,
}

impl DueItem {
    pub fn is_new(&self) -> bool {
        self.schedule.is_none()
    }
}

/// A capped batch of due items plus the uncapped count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueSet {
    pub items: Vec<DueItem>,
    /// Every due item, including those cut by the limit
    pub total_due: usize,
}

impl DueSet {
    /// Due items not included in this batch
    pub fn remaining(&self) -> usize {
        self.total_due.saturating_sub(self.items.len())
    }

    /// Just the learning items, in presentation order
    pub fn learning_items(&self) -> impl Iterator<Item = &LearningItem> {
        self.items.iter().map(|due| &due.item)
    }
}

/// Select the ordered due subset of `items` at `now`, at most `limit` long.
///
/// Pure: no persistence, no clock. Safe to call concurrently over shared
/// snapshots.
pub fn select_due<I>(items: I, now: DateTime<Utc>, limit: usize) -> DueSet
where
    I: IntoIterator<Item = (LearningItem, Option<ScheduledState>)>,
{
    let mut overdue: Vec<(LearningItem, ScheduledState)> = Vec::new();
    let mut fresh: Vec<LearningItem> = Vec::new();

    for (item, schedule) in items {
        if item.is_deleted() {
            continue;
        }
        match schedule {
            None => fresh.push(item),
            Some(scheduled) if scheduled.is_due(now) => overdue.push((item, scheduled)),
            Some(_) => {}
        }
    }

    let total_due = overdue.len() + fresh.len();

    overdue.sort_by(|(a_item, a), (b_item, b)| {
        a.next_due
            .cmp(&b.next_due)
            .then(a_item.created_at.cmp(&b_item.created_at))
            .then(a_item.id.cmp(&b_item.id))
    });
    fresh.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let items = overdue
        .into_iter()
        .map(|(item, scheduled)| DueItem {
            item,
            schedule: Some(scheduled),
        })
        .chain(fresh.into_iter().map(|item| DueItem { item, schedule: None }))
        .take(limit)
        .collect();

    DueSet { items, total_due }
}

// ============================================================================
// TESTS
// ============================================================================

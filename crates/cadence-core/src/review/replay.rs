//! History Replayer
//!
//! Rebuilds an item's memory state by folding [`Scheduler::next_state`] over
//! its review records in order. This is the source of truth for memory
//! state; snapshots are only ever a cached copy of its output.
//!
//! The replayer receives history already filtered of soft-deleted records and
//! ordered by `reviewed_at`. It checks that claim and refuses to repair it.

use crate::error::{Result, SchedulerError};
use crate::fsrs::Scheduler;
use crate::memory::{MemoryState, ReviewRecord, ScheduledState};

/// Folds review histories through a scheduler
#[derive(Debug, Clone, Copy)]
pub struct HistoryReplayer<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> HistoryReplayer<'a> {
    pub fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    /// Memory state and due time after the whole history.
    ///
    /// `None` for an empty history. The due time is the last record's stored
    /// `next_due`, so any fuzz applied when it was recorded is kept.
    pub fn replay(&self, history: &[ReviewRecord]) -> Result<Option<ScheduledState>> {
        validate_history(history)?;

        let mut state: Option<MemoryState> = None;
        for record in history {
            state = Some(self.scheduler.next_state(state.as_ref(), record.rating, record.reviewed_at));
        }

        Ok(state.zip(history.last()).map(|(memory, last)| ScheduledState {
            memory,
            next_due: last.next_due,
        }))
    }

    /// Only the final memory state
    pub fn replay_state(&self, history: &[ReviewRecord]) -> Result<Option<MemoryState>> {
        Ok(self.replay(history)?.map(|scheduled| scheduled.memory))
    }
}

/// Reject histories that are out of order, mix items, or end before they begin
pub fn validate_history(history: &[ReviewRecord]) -> Result<()> {
    let Some(first) = history.first() else {
        return Ok(());
    };

    for (index, record) in history.iter().enumerate() {
        if record.item_id != first.item_id {
            return Err(SchedulerError::InvalidHistory(format!(
                "record {} belongs to item {}, expected {}",
                record.id, record.item_id, first.item_id
            )));
        }
        if record.next_due < record.reviewed_at {
            return Err(SchedulerError::InvalidHistory(format!(
                "record {} is due ({}) before it was reviewed ({})",
                record.id,
                record.next_due.to_rfc3339(),
                record.reviewed_at.to_rfc3339()
            )));
        }
        if index > 0 && record.reviewed_at < history[index - 1].reviewed_at {
            return Err(SchedulerError::InvalidHistory(format!(
                "record {} ({}) precedes the record before it ({})",
                record.id,
                record.reviewed_at.to_rfc3339(),
                history[index - 1].reviewed_at.to_rfc3339()
            )));
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

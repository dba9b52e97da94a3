//! Review Recorder
//!
//! One review transaction: validate the score, load the prior state (replay
//! or snapshot), schedule, and hand back a complete immutable record. The
//! recorder never touches a store; persisting the record is the caller's job.
//!
//! # Concurrency precondition
//!
//! The result is computed from a snapshot of prior history. Callers must
//! ensure at most one review is being recorded for a given (account, item)
//! at a time, e.g. with a per-item lock, a single writer, or an optimistic
//! version check on the stored history. Two reviews racing against the same
//! stale history would both be scheduled from it and one would be lost.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::replay::HistoryReplayer;
use super::snapshot::{Snapshot, SnapshotCache};
use crate::error::{Result, SchedulerError};
use crate::fsrs::{Rating, ScheduleOutcome, Scheduler};
use crate::memory::{MemoryState, ReviewRecord, ScheduledState};

/// A recorded review and the state it leaves the item in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedReview {
    pub record: ReviewRecord,
    pub scheduled: ScheduledState,
    /// State before the review; `None` for a first review
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<ScheduledState>,
}

/// Builds review records from ratings
#[derive(Debug, Clone, Default)]
pub struct ReviewRecorder {
    scheduler: Scheduler,
}

impl ReviewRecorder {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn replayer(&self) -> HistoryReplayer<'_> {
        HistoryReplayer::new(&self.scheduler)
    }

    /// Record a review against the item's full prior history.
    ///
    /// `prior_history` must be the item's non-deleted records in
    /// `reviewed_at` order. Fails with `InvalidRating` for out-of-scale
    /// scores and `InvalidHistory` for inconsistent history or a `now`
    /// earlier than the last review.
    pub fn record_review(
        &self,
        item_id: Uuid,
        prior_history: &[ReviewRecord],
        score: i32,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord> {
        Ok(self.review(item_id, prior_history, score, now)?.record)
    }

    /// [`ReviewRecorder::record_review`] returning the resulting state as well
    pub fn review(
        &self,
        item_id: Uuid,
        prior_history: &[ReviewRecord],
        score: i32,
        now: DateTime<Utc>,
    ) -> Result<RecordedReview> {
        let rating = self.scheduler.map_rating(score)?;
        let prior = self.prior_from_history(item_id, prior_history)?;
        self.finish(item_id, prior, score, rating, now, |s, state, rating, now| {
            s.schedule(state, rating, now)
        })
    }

    /// Like [`ReviewRecorder::review`], fuzzing the interval with `rng` when the
    /// config enables it
    pub fn review_with_rng<R: Rng + ?Sized>(
        &self,
        item_id: Uuid,
        prior_history: &[ReviewRecord],
        score: i32,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<RecordedReview> {
        let rating = self.scheduler.map_rating(score)?;
        let prior = self.prior_from_history(item_id, prior_history)?;
        self.finish(item_id, prior, score, rating, now, |s, state, rating, now| {
            s.schedule_with_rng(state, rating, now, rng)
        })
    }

    /// Record a review from an already-known prior state.
    ///
    /// The record is identical (apart from its fresh id) to the one
    /// [`ReviewRecorder::record_review`] builds from the history that produced
    /// `snapshot`.
    pub fn record_review_from_snapshot(
        &self,
        item_id: Uuid,
        snapshot: Option<&ScheduledState>,
        score: i32,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord> {
        Ok(self.review_from_snapshot(item_id, snapshot.copied(), score, now)?.record)
    }

    /// [`ReviewRecorder::record_review_from_snapshot`] returning the resulting
    /// state as well
    pub fn review_from_snapshot(
        &self,
        item_id: Uuid,
        prior: Option<ScheduledState>,
        score: i32,
        now: DateTime<Utc>,
    ) -> Result<RecordedReview> {
        let rating = self.scheduler.map_rating(score)?;
        self.finish(item_id, prior, score, rating, now, |s, state, rating, now| {
            s.schedule(state, rating, now)
        })
    }

    /// [`ReviewRecorder::review_from_snapshot`] with interval fuzzing
    pub fn review_from_snapshot_with_rng<R: Rng + ?Sized>(
        &self,
        item_id: Uuid,
        prior: Option<ScheduledState>,
        score: i32,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<RecordedReview> {
        let rating = self.scheduler.map_rating(score)?;
        self.finish(item_id, prior, score, rating, now, |s, state, rating, now| {
            s.schedule_with_rng(state, rating, now, rng)
        })
    }

    /// Record a review, reading and refreshing a snapshot cache.
    ///
    /// The cache is only consulted while its snapshot matches the head of
    /// `prior_history`; otherwise the history is replayed. On success the
    /// cache holds the new state keyed by the new record.
    pub fn record_with_cache(
        &self,
        cache: &SnapshotCache,
        item_id: Uuid,
        prior_history: &[ReviewRecord],
        score: i32,
        now: DateTime<Utc>,
    ) -> Result<RecordedReview> {
        let rating = self.scheduler.map_rating(score)?;
        check_item(item_id, prior_history)?;
        let prior = cache.resolve(&self.replayer(), item_id, prior_history)?;
        let recorded = self.finish(item_id, prior, score, rating, now, |s, state, rating, now| {
            s.schedule(state, rating, now)
        })?;

        cache.insert(
            item_id,
            Snapshot {
                scheduled: recorded.scheduled,
                last_record_id: recorded.record.id,
                review_count: prior_history.len() + 1,
            },
        );
        Ok(recorded)
    }

    fn prior_from_history(&self, item_id: Uuid, history: &[ReviewRecord]) -> Result<Option<ScheduledState>> {
        check_item(item_id, history)?;
        self.replayer().replay(history)
    }

    fn finish<F>(
        &self,
        item_id: Uuid,
        prior: Option<ScheduledState>,
        score: i32,
        rating: Rating,
        now: DateTime<Utc>,
        schedule: F,
    ) -> Result<RecordedReview>
    where
        F: FnOnce(&Scheduler, Option<&MemoryState>, Rating, DateTime<Utc>) -> ScheduleOutcome,
    {
        if let Some(prior) = &prior {
            if now < prior.memory.last_reviewed {
                return Err(SchedulerError::InvalidHistory(format!(
                    "review at {} precedes the last review at {}",
                    now.to_rfc3339(),
                    prior.memory.last_reviewed.to_rfc3339()
                )));
            }
        }

        let outcome = schedule(&self.scheduler, prior.as_ref().map(|p| &p.memory), rating, now);

        let record = ReviewRecord {
            id: Uuid::new_v4(),
            item_id,
            quality: score,
            rating,
            reviewed_at: now,
            next_due: outcome.next_due,
            deleted_at: None,
        };

        tracing::debug!(
            %item_id,
            %rating,
            stability = outcome.state.stability,
            difficulty = outcome.state.difficulty,
            interval_days = outcome.interval_days,
            "Review recorded"
        );

        Ok(RecordedReview {
            record,
            scheduled: outcome.scheduled(),
            previous: prior,
        })
    }
}

fn check_item(item_id: Uuid, history: &[ReviewRecord]) -> Result<()> {
    match history.iter().find(|r| r.item_id != item_id) {
        Some(stray) => Err(SchedulerError::InvalidHistory(format!(
            "record {} belongs to item {}, not {}",
            stray.id, stray.item_id, item_id
        ))),
        None => Ok(()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

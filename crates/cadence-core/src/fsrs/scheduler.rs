//! Scheduler - turns (prior state, rating, now) into (new state, next due)

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::algorithm::{
    clamp_interval, fuzz_interval, initial_difficulty, initial_stability, next_difficulty,
    next_forget_stability, next_recall_stability, raw_interval, retrievability,
};
use super::rating::Rating;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::memory::{MemoryState, ScheduledState};

// ============================================================================
// OUTCOMES
// ============================================================================

/// Result of scheduling one review
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    /// Memory state after the review
    pub state: MemoryState,
    /// When the item is next due
    pub next_due: DateTime<Utc>,
    /// Whole days between the review and `next_due`
    pub interval_days: u32,
}

impl ScheduleOutcome {
    pub fn scheduled(&self) -> ScheduledState {
        ScheduledState {
            memory: self.state,
            next_due: self.next_due,
        }
    }
}

/// Outcomes for every possible rating, for "what happens if" displays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResults {
    /// Outcome if the item is forgotten
    pub again: ScheduleOutcome,
    /// Outcome if recalled with effort
    pub hard: ScheduleOutcome,
    /// Outcome if recalled normally
    pub good: ScheduleOutcome,
    /// Outcome if recalled effortlessly
    pub easy: ScheduleOutcome,
}

impl PreviewResults {
    /// Outcome for one rating
    pub fn get(&self, rating: Rating) -> &ScheduleOutcome {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// The scheduling core.
///
/// Holds only a validated [`SchedulerConfig`]. Every method is a pure function
/// of its arguments: no clock reads, no hidden randomness. Interval fuzzing
/// happens only through [`Scheduler::schedule_with_rng`], with an RNG the
/// caller owns, and only when the config enables it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
        }
    }
}

impl Scheduler {
    /// Build a scheduler, rejecting configs that violate their invariants
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Map a user score through the configured scale
    pub fn map_rating(&self, score: i32) -> Result<Rating> {
        self.config.rating_scale.map(score)
    }

    /// Memory state after a review, without computing an interval.
    ///
    /// `None` means the item has never been reviewed; the state is seeded
    /// from the per-rating tables. Otherwise retrievability at `now` drives
    /// the update.
    pub fn next_state(&self, state: Option<&MemoryState>, rating: Rating, now: DateTime<Utc>) -> MemoryState {
        let config = &self.config;
        let Some(prior) = state else {
            return MemoryState {
                difficulty: initial_difficulty(rating, config),
                stability: initial_stability(rating, config),
                last_reviewed: now,
            };
        };

        let r = retrievability(prior.elapsed_days(now), prior.stability, config.decay);
        let stability = match rating {
            Rating::Again => next_forget_stability(prior.difficulty, prior.stability, r, config),
            _ => next_recall_stability(prior.difficulty, prior.stability, r, rating, config),
        };

        MemoryState {
            difficulty: next_difficulty(prior.difficulty, rating, config),
            stability,
            last_reviewed: now,
        }
    }

    /// Whole-day interval for a state, clamped to the configured bounds
    pub fn interval_days(&self, state: &MemoryState) -> u32 {
        clamp_interval(raw_interval(state.stability, &self.config), &self.config)
    }

    /// Schedule a review deterministically (no fuzz, whatever the config says)
    pub fn schedule(&self, state: Option<&MemoryState>, rating: Rating, now: DateTime<Utc>) -> ScheduleOutcome {
        let next = self.next_state(state, rating, now);
        let interval_days = self.interval_days(&next);
        self.outcome(next, interval_days, now)
    }

    /// Schedule a review, fuzzing the interval with `rng` when enabled.
    ///
    /// Fuzz only moves the due date; the returned memory state is identical
    /// to [`Scheduler::schedule`].
    pub fn schedule_with_rng<R: Rng + ?Sized>(
        &self,
        state: Option<&MemoryState>,
        rating: Rating,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> ScheduleOutcome {
        if !self.config.fuzz_enabled {
            return self.schedule(state, rating, now);
        }
        let next = self.next_state(state, rating, now);
        let raw = raw_interval(next.stability, &self.config);
        let fuzzed = fuzz_interval(raw, self.config.fuzz_factor, rng);
        let interval_days = clamp_interval(fuzzed, &self.config);
        self.outcome(next, interval_days, now)
    }

    /// Outcomes for all four ratings from the same prior state
    pub fn preview(&self, state: Option<&MemoryState>, now: DateTime<Utc>) -> PreviewResults {
        PreviewResults {
            again: self.schedule(state, Rating::Again, now),
            hard: self.schedule(state, Rating::Hard, now),
            good: self.schedule(state, Rating::Good, now),
            easy: self.schedule(state, Rating::Easy, now),
        }
    }

    /// Estimated probability of recall at `at`
    pub fn retrievability_at(&self, state: &MemoryState, at: DateTime<Utc>) -> f64 {
        retrievability(state.elapsed_days(at), state.stability, self.config.decay)
    }

    fn outcome(&self, state: MemoryState, interval_days: u32, now: DateTime<Utc>) -> ScheduleOutcome {
        let next_due = now
            .checked_add_signed(Duration::days(interval_days as i64))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        ScheduleOutcome {
            state,
            next_due,
            interval_days,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

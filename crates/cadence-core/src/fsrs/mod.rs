//! FSRS-style Scheduler Module
//!
//! Memory model and interval scheduling in the Free Spaced Repetition
//! Scheduler family.
//!
//! Reference: https://github.com/open-spaced-repetition/fsrs4anki
//!
//! ## Core Formulas:
//! - Retrievability: R = (1 + FACTOR * t / S)^(-decay) where FACTOR = 0.9^(-1/decay) - 1
//! - Interval: t = S/FACTOR * (target^(-1/decay) - 1), clamped to the configured day range
//! - Recall: stability grows, less for hard items, stable items, and early reviews
//! - Lapse: stability falls to at most a fixed fraction of its prior value

mod algorithm;
mod rating;
mod scheduler;

pub use algorithm::{
    clamp_interval,
    forgetting_factor,
    fuzz_interval,
    initial_difficulty,
    initial_stability,
    next_difficulty,
    next_forget_stability,
    next_recall_stability,
    raw_interval,
    // Core functions
    retrievability,
    // Constants
    STABILITY_ANCHOR_RETENTION,
};

pub use rating::{map_rating, Rating, RatingScale};

pub use scheduler::{PreviewResults, ScheduleOutcome, Scheduler};

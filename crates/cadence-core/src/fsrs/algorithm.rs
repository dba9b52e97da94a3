//! FSRS-style memory model formulas
//!
//! Pure functions only. Every coefficient comes from [`SchedulerConfig`];
//! nothing here reads a clock or an RNG it was not handed.
//!
//! ## Forgetting curve
//!
//! `R(t, S) = (1 + FACTOR * t / S)^(-decay)` where
//! `FACTOR = 0.9^(-1/decay) - 1`, so `R(S, S) = 0.9` for any decay: stability
//! is the number of days until recall probability falls to 90%.
//!
//! ## Interval
//!
//! Solving the curve for a target retention `r` gives
//! `t = S / FACTOR * (r^(-1/decay) - 1)`.

use rand::Rng;

use crate::config::SchedulerConfig;
use crate::fsrs::Rating;

/// Retention at which `t == S` on the forgetting curve
pub const STABILITY_ANCHOR_RETENTION: f64 = 0.9;

// ============================================================================
// FORGETTING CURVE
// ============================================================================

/// Curve scale factor for a decay exponent
pub fn forgetting_factor(decay: f64) -> f64 {
    STABILITY_ANCHOR_RETENTION.powf(-1.0 / decay) - 1.0
}

/// Probability of recall after `elapsed_days` at the given stability
pub fn retrievability(elapsed_days: f64, stability: f64, decay: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    let elapsed = elapsed_days.max(0.0);
    (1.0 + forgetting_factor(decay) * elapsed / stability).powf(-decay)
}

/// Unrounded days until retrievability reaches the configured target
pub fn raw_interval(stability: f64, config: &SchedulerConfig) -> f64 {
    let factor = forgetting_factor(config.decay);
    stability / factor * (config.target_retention.powf(-1.0 / config.decay) - 1.0)
}

/// Round and clamp an interval to `[min_interval_days, max_interval_days]`
pub fn clamp_interval(raw_days: f64, config: &SchedulerConfig) -> u32 {
    let min = config.min_interval_days;
    let max = config.max_interval_days;
    if !raw_days.is_finite() {
        return if raw_days.is_sign_negative() { min } else { max };
    }
    let rounded = raw_days.round();
    if rounded <= min as f64 {
        min
    } else if rounded >= max as f64 {
        max
    } else {
        rounded as u32
    }
}

/// Scale an interval by a uniform factor in `[1 - fuzz_factor, 1 + fuzz_factor]`
pub fn fuzz_interval<R: Rng + ?Sized>(raw_days: f64, fuzz_factor: f64, rng: &mut R) -> f64 {
    if fuzz_factor <= 0.0 {
        return raw_days;
    }
    let scale = rng.gen_range((1.0 - fuzz_factor)..=(1.0 + fuzz_factor));
    raw_days * scale
}

// ============================================================================
// FIRST REVIEW
// ============================================================================

/// Seed stability for an item's first review
pub fn initial_stability(rating: Rating, config: &SchedulerConfig) -> f64 {
    clamp_stability(config.initial_stability_for(rating), config)
}

/// Seed difficulty for an item's first review
pub fn initial_difficulty(rating: Rating, config: &SchedulerConfig) -> f64 {
    clamp_difficulty(config.initial_difficulty_for(rating), config)
}

// ============================================================================
// SUBSEQUENT REVIEWS
// ============================================================================

/// Difficulty after a review.
///
/// Moves away from the current value by `difficulty_delta` per rating step
/// from Good, damped as it approaches the ceiling, then reverts slightly
/// toward the Easy seed so difficulty cannot ratchet forever.
///
/// Again never lowers difficulty. Near the ceiling the damped step is smaller
/// than the reversion pull, so the result is held at the current value.
pub fn next_difficulty(difficulty: f64, rating: Rating, config: &SchedulerConfig) -> f64 {
    let span = config.max_difficulty - config.min_difficulty;
    let delta = -config.difficulty_delta * (rating.as_i32() as f64 - 3.0);
    let damped = difficulty + delta * (config.max_difficulty - difficulty) / span;
    let anchor = config.initial_difficulty_for(Rating::Easy);
    let reverted = config.mean_reversion * anchor + (1.0 - config.mean_reversion) * damped;
    let next = match rating {
        Rating::Again => reverted.max(difficulty),
        _ => reverted,
    };
    clamp_difficulty(next, config)
}

/// Stability after a successful recall (Hard, Good or Easy).
///
/// `S' = S * (1 + e^growth * (max_d + 1 - D) * S^(-k) * (e^(w * (1 - R)) - 1) * m)`
/// where `m` is the Hard penalty, 1, or the Easy bonus. Every factor is
/// non-negative, so `S' >= S` for any in-bounds `S`. Growth shrinks as
/// difficulty rises, as the item gets more stable, and as retrievability at
/// review time rises.
pub fn next_recall_stability(
    difficulty: f64,
    stability: f64,
    retrievability: f64,
    rating: Rating,
    config: &SchedulerConfig,
) -> f64 {
    let multiplier = match rating {
        Rating::Hard => config.hard_penalty,
        Rating::Easy => config.easy_bonus,
        _ => 1.0,
    };
    let ease = (config.max_difficulty + 1.0 - difficulty).max(0.0);
    let saturation = stability.powf(-config.recall_stability_decay);
    let forgotten = (config.recall_retrievability_weight * (1.0 - retrievability)).exp() - 1.0;
    let growth = config.recall_growth.exp() * ease * saturation * forgotten.max(0.0) * multiplier;
    clamp_stability(stability * (1.0 + growth), config)
}

/// Stability after a lapse (Again).
///
/// The post-lapse estimate is capped at `lapse_stability_cap * S`, so a
/// lapse always costs a fixed fraction of stability at minimum. The one
/// exception is the floor: at `min_stability` the result is clamped back to
/// `min_stability`, so a lapse there leaves stability unchanged.
pub fn next_forget_stability(
    difficulty: f64,
    stability: f64,
    retrievability: f64,
    config: &SchedulerConfig,
) -> f64 {
    let post_lapse = config.forget_multiplier
        * difficulty.powf(-config.forget_difficulty_exponent)
        * ((stability + 1.0).powf(config.forget_stability_exponent) - 1.0)
        * (config.forget_retrievability_weight * (1.0 - retrievability)).exp();
    clamp_stability(post_lapse.min(stability * config.lapse_stability_cap), config)
}

fn clamp_difficulty(difficulty: f64, config: &SchedulerConfig) -> f64 {
    difficulty.clamp(config.min_difficulty, config.max_difficulty)
}

fn clamp_stability(stability: f64, config: &SchedulerConfig) -> f64 {
    if stability.is_nan() {
        return config.min_stability;
    }
    stability.clamp(config.min_stability, config.max_stability)
}

// ============================================================================
// TESTS
// ============================================================================

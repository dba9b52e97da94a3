//! Scheduler Configuration
//!
//! Every tunable value the scheduler reads lives in [`SchedulerConfig`]. The
//! defaults follow the published FSRS-5 weights; the exact coefficients are
//! meant to be calibrated against real review data, but their *shape*
//! (ordering of the seed tables, bounds, penalty ranges) is enforced by
//! [`SchedulerConfig::validate`].
//!
//! Configs can be loaded from TOML. Omitted keys fall back to the defaults:
//!
//! ```toml
//! target_retention = 0.85
//! max_interval_days = 3650
//! fuzz_enabled = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::fsrs::{Rating, RatingScale};

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default probability of recall the scheduler aims for at the next review
pub const DEFAULT_TARGET_RETENTION: f64 = 0.9;

/// Default forgetting-curve decay exponent
pub const DEFAULT_DECAY: f64 = 0.5;

/// Default longest interval (100 years)
pub const DEFAULT_MAX_INTERVAL_DAYS: u32 = 36_500;

/// Easiest possible item
pub const MIN_DIFFICULTY: f64 = 1.0;

/// Hardest possible item
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Stability floor (days)
pub const MIN_STABILITY: f64 = 0.01;

/// Stability ceiling (days)
pub const MAX_STABILITY: f64 = 36_500.0;

/// Seed stability per first rating (Again, Hard, Good, Easy)
pub const DEFAULT_INITIAL_STABILITY: [f64; 4] = [0.40255, 1.18385, 3.173, 15.69105];

/// Seed difficulty per first rating (Again, Hard, Good, Easy)
pub const DEFAULT_INITIAL_DIFFICULTY: [f64; 4] = [7.1949, 6.4883, 5.2824, 3.2243];

// ============================================================================
// ERRORS
// ============================================================================

/// Failure to load a configuration file
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed TOML or unknown key
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Parsed, but a value violates its invariants
    #[error(transparent)]
    Invalid(#[from] SchedulerError),
}

// ============================================================================
// CONFIG
// ============================================================================

/// The single parameter block for the scheduling engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Scale callers grade on
    pub rating_scale: RatingScale,
    /// Retrievability the next review is scheduled at (0, 1)
    pub target_retention: f64,
    /// Forgetting-curve decay exponent
    pub decay: f64,
    /// Shortest interval in days
    pub min_interval_days: u32,
    /// Longest interval in days
    pub max_interval_days: u32,

    /// Stability after the first review, indexed by rating
    pub initial_stability: [f64; 4],
    /// Difficulty after the first review, indexed by rating
    pub initial_difficulty: [f64; 4],

    /// Lowest difficulty any review can produce
    pub min_difficulty: f64,
    /// Highest difficulty any review can produce
    pub max_difficulty: f64,
    /// Stability floor in days, also the result of a lapse at the floor
    pub min_stability: f64,
    /// Stability ceiling in days
    pub max_stability: f64,

    /// Difficulty step per rating away from Good
    pub difficulty_delta: f64,
    /// Pull of difficulty back toward the Easy seed on every review
    pub mean_reversion: f64,

    /// Log-scale stability growth on successful recall
    pub recall_growth: f64,
    /// Exponent damping growth for already-stable items
    pub recall_stability_decay: f64,
    /// Weight of forgetting (1 - R) in the growth term
    pub recall_retrievability_weight: f64,
    /// Growth multiplier for Hard, in (0, 1]
    pub hard_penalty: f64,
    /// Growth multiplier for Easy, >= 1
    pub easy_bonus: f64,

    /// Post-lapse stability scale
    pub forget_multiplier: f64,
    /// Exponent on difficulty in the post-lapse term
    pub forget_difficulty_exponent: f64,
    /// Exponent on prior stability in the post-lapse term
    pub forget_stability_exponent: f64,
    /// Weight of forgetting (1 - R) in the post-lapse term
    pub forget_retrievability_weight: f64,
    /// Upper bound on post-lapse stability as a fraction of prior stability
    pub lapse_stability_cap: f64,

    /// Perturb intervals to spread out due dates
    pub fuzz_enabled: bool,
    /// Maximum relative perturbation when fuzzing
    pub fuzz_factor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rating_scale: RatingScale::FivePoint,
            target_retention: DEFAULT_TARGET_RETENTION,
            decay: DEFAULT_DECAY,
            min_interval_days: 1,
            max_interval_days: DEFAULT_MAX_INTERVAL_DAYS,
            initial_stability: DEFAULT_INITIAL_STABILITY,
            initial_difficulty: DEFAULT_INITIAL_DIFFICULTY,
            min_difficulty: MIN_DIFFICULTY,
            max_difficulty: MAX_DIFFICULTY,
            min_stability: MIN_STABILITY,
            max_stability: MAX_STABILITY,
            difficulty_delta: 1.4604,
            mean_reversion: 0.0046,
            recall_growth: 1.54575,
            recall_stability_decay: 0.1192,
            recall_retrievability_weight: 1.01925,
            hard_penalty: 0.2315,
            easy_bonus: 2.9898,
            forget_multiplier: 1.9395,
            forget_difficulty_exponent: 0.11,
            forget_stability_exponent: 0.29605,
            forget_retrievability_weight: 2.2698,
            lapse_stability_cap: 0.5,
            fuzz_enabled: false,
            fuzz_factor: 0.05,
        }
    }
}

impl SchedulerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "Loaded scheduler config");
        Ok(config)
    }

    /// Seed stability for a first review
    pub fn initial_stability_for(&self, rating: Rating) -> f64 {
        self.initial_stability[rating.index()]
    }

    /// Seed difficulty for a first review
    pub fn initial_difficulty_for(&self, rating: Rating) -> f64 {
        self.initial_difficulty[rating.index()]
    }

    /// Check every invariant the scheduler relies on.
    ///
    /// Runs once when a config is loaded or a scheduler is built, never per
    /// call.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        fn invalid(message: String) -> Result<(), SchedulerError> {
            Err(SchedulerError::Configuration(message))
        }

        let finite = [
            ("target_retention", self.target_retention),
            ("decay", self.decay),
            ("min_difficulty", self.min_difficulty),
            ("max_difficulty", self.max_difficulty),
            ("min_stability", self.min_stability),
            ("max_stability", self.max_stability),
            ("difficulty_delta", self.difficulty_delta),
            ("mean_reversion", self.mean_reversion),
            ("recall_growth", self.recall_growth),
            ("recall_stability_decay", self.recall_stability_decay),
            ("recall_retrievability_weight", self.recall_retrievability_weight),
            ("hard_penalty", self.hard_penalty),
            ("easy_bonus", self.easy_bonus),
            ("forget_multiplier", self.forget_multiplier),
            ("forget_difficulty_exponent", self.forget_difficulty_exponent),
            ("forget_stability_exponent", self.forget_stability_exponent),
            ("forget_retrievability_weight", self.forget_retrievability_weight),
            ("lapse_stability_cap", self.lapse_stability_cap),
            ("fuzz_factor", self.fuzz_factor),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{} must be finite, got {}", name, value));
        }

        if !(self.target_retention > 0.0 && self.target_retention < 1.0) {
            return invalid(format!(
                "target_retention must be in (0, 1), got {}",
                self.target_retention
            ));
        }
        if self.decay <= 0.0 {
            return invalid(format!("decay must be positive, got {}", self.decay));
        }

        if self.min_interval_days < 1 {
            return invalid("min_interval_days must be at least 1".to_string());
        }
        if self.max_interval_days < self.min_interval_days {
            return invalid(format!(
                "max_interval_days ({}) is smaller than min_interval_days ({})",
                self.max_interval_days, self.min_interval_days
            ));
        }

        if self.min_difficulty <= 0.0 || self.max_difficulty <= self.min_difficulty {
            return invalid(format!(
                "difficulty bounds must satisfy 0 < min < max, got [{}, {}]",
                self.min_difficulty, self.max_difficulty
            ));
        }
        if self.min_stability <= 0.0 || self.max_stability <= self.min_stability {
            return invalid(format!(
                "stability bounds must satisfy 0 < min < max, got [{}, {}]",
                self.min_stability, self.max_stability
            ));
        }

        for (rating, s) in Rating::ALL.iter().zip(self.initial_stability) {
            if !s.is_finite() || s < self.min_stability || s > self.max_stability {
                return invalid(format!(
                    "initial_stability for {} ({}) is outside [{}, {}]",
                    rating, s, self.min_stability, self.max_stability
                ));
            }
        }
        if self.initial_stability.windows(2).any(|w| w[0] > w[1]) {
            return invalid("initial_stability must be non-decreasing from Again to Easy".to_string());
        }

        for (rating, d) in Rating::ALL.iter().zip(self.initial_difficulty) {
            if !d.is_finite() || d < self.min_difficulty || d > self.max_difficulty {
                return invalid(format!(
                    "initial_difficulty for {} ({}) is outside [{}, {}]",
                    rating, d, self.min_difficulty, self.max_difficulty
                ));
            }
        }
        if self.initial_difficulty.windows(2).any(|w| w[0] < w[1]) {
            return invalid("initial_difficulty must be non-increasing from Again to Easy".to_string());
        }

        if self.difficulty_delta < 0.0 {
            return invalid("difficulty_delta must not be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.mean_reversion) {
            return invalid(format!(
                "mean_reversion must be in [0, 1], got {}",
                self.mean_reversion
            ));
        }

        if self.recall_stability_decay < 0.0 || self.recall_retrievability_weight <= 0.0 {
            return invalid("recall exponents must be non-negative and the retrievability weight positive".to_string());
        }
        if !(self.hard_penalty > 0.0 && self.hard_penalty <= 1.0) {
            return invalid(format!("hard_penalty must be in (0, 1], got {}", self.hard_penalty));
        }
        if self.easy_bonus < 1.0 {
            return invalid(format!("easy_bonus must be at least 1, got {}", self.easy_bonus));
        }

        if self.forget_multiplier <= 0.0 {
            return invalid("forget_multiplier must be positive".to_string());
        }
        if !(self.lapse_stability_cap > 0.0 && self.lapse_stability_cap < 1.0) {
            return invalid(format!(
                "lapse_stability_cap must be in (0, 1), got {}",
                self.lapse_stability_cap
            ));
        }

        if !(0.0..0.5).contains(&self.fuzz_factor) {
            return invalid(format!("fuzz_factor must be in [0, 0.5), got {}", self.fuzz_factor));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Ratings and the user-scale mapping table
//!
//! Users grade recall on a coarse integer scale. The scheduler only knows four
//! tiers, so every score is translated through a fixed table:
//!
//! | Score | Four-point | Five-point |
//! |-------|------------|------------|
//! | 1     | Again      | Again      |
//! | 2     | Hard       | Again      |
//! | 3     | Good       | Hard       |
//! | 4     | Easy       | Good       |
//! | 5     | -          | Easy       |
//!
//! On the five-point scale both 1 ("blackout") and 2 ("wrong, but recognised
//! the answer") count as a lapse. Anything outside the table is rejected.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

// ============================================================================
// RATING
// ============================================================================

/// Internal review rating, ordered from total failure to effortless recall
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Forgot the item
    Again = 1,
    /// Recalled with serious difficulty
    Hard = 2,
    /// Recalled after some hesitation
    Good = 3,
    /// Perfect, fast recall
    Easy = 4,
}

impl Rating {
    /// All ratings in ascending order
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Parse from the canonical 1-4 tier number
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    /// Canonical 1-4 tier number
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Zero-based index into per-rating parameter tables
    pub(crate) fn index(&self) -> usize {
        (*self as usize) - 1
    }

    /// Whether this rating counts as a successful recall
    pub fn is_recall(&self) -> bool {
        !matches!(self, Rating::Again)
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "again" => Ok(Rating::Again),
            "hard" => Ok(Rating::Hard),
            "good" => Ok(Rating::Good),
            "easy" => Ok(Rating::Easy),
            _ => Err(format!("Unknown rating: {}", s)),
        }
    }
}

// ============================================================================
// USER SCALES
// ============================================================================

/// The user-facing quality scale a caller grades on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RatingScale {
    /// 1 = Again, 2 = Hard, 3 = Good, 4 = Easy
    FourPoint,
    /// 1-2 = Again, 3 = Hard, 4 = Good, 5 = Easy
    #[default]
    FivePoint,
}

impl RatingScale {
    /// Lowest accepted score
    pub fn min_score(&self) -> i32 {
        1
    }

    /// Highest accepted score
    pub fn max_score(&self) -> i32 {
        match self {
            RatingScale::FourPoint => 4,
            RatingScale::FivePoint => 5,
        }
    }

    /// Whether `score` is inside this scale's domain
    pub fn contains(&self, score: i32) -> bool {
        (self.min_score()..=self.max_score()).contains(&score)
    }

    /// Translate a user score through the fixed table.
    ///
    /// Out-of-domain scores fail with [`SchedulerError::InvalidRating`]; they
    /// are never clamped.
    pub fn map(&self, score: i32) -> Result<Rating> {
        let rating = match (self, score) {
            (RatingScale::FourPoint, 1) => Rating::Again,
            (RatingScale::FourPoint, 2) => Rating::Hard,
            (RatingScale::FourPoint, 3) => Rating::Good,
            (RatingScale::FourPoint, 4) => Rating::Easy,
            (RatingScale::FivePoint, 1 | 2) => Rating::Again,
            (RatingScale::FivePoint, 3) => Rating::Hard,
            (RatingScale::FivePoint, 4) => Rating::Good,
            (RatingScale::FivePoint, 5) => Rating::Easy,
            _ => return Err(SchedulerError::InvalidRating { score, scale: *self }),
        };
        Ok(rating)
    }
}

impl std::fmt::Display for RatingScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RatingScale::FourPoint => write!(f, "four-point (1-4)"),
            RatingScale::FivePoint => write!(f, "five-point (1-5)"),
        }
    }
}

/// Map a user score to an internal rating on the given scale
pub fn map_rating(score: i32, scale: RatingScale) -> Result<Rating> {
    scale.map(score)
}

// ============================================================================
// TESTS
// ============================================================================

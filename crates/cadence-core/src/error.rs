//! Scheduling Errors
//!
//! Every failure the engine can report. Nothing here is retried internally:
//! the engine is deterministic, so the caller has to fix the input or the
//! configuration.

use crate::fsrs::RatingScale;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Scheduling error type
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulerError {
    /// A quality score outside the configured rating scale
    #[error("Invalid rating {score} on the {scale} scale")]
    InvalidRating {
        /// The rejected score
        score: i32,
        /// The scale it was checked against
        scale: RatingScale,
    },
    /// Review history is out of order or internally inconsistent
    #[error("Invalid history: {0}")]
    InvalidHistory(String),
    /// A parameter override violates its own invariants
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Scheduling result type
pub type Result<T> = std::result::Result<T, SchedulerError>;

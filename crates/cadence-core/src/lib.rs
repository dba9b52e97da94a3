//! # Cadence Core
//!
//! Spaced-repetition scheduling engine. Given an item's review history it
//! decides when the item should be seen again:
//!
//! - **Memory model**: per-item difficulty and stability, FSRS-style
//! - **Scheduler**: retrievability-driven state updates and day intervals,
//!   optionally fuzzed with a caller-owned RNG
//! - **History replay**: memory state is always a fold over the review log
//! - **Due-set selection**: most overdue first, then never-seen items
//! - **Review recording**: one validated, immutable record per review
//! - **Reference store**: SQLite with persisted snapshots and migrations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadence_core::{NewItem, Storage};
//!
//! // Create storage (uses default platform-specific location)
//! let storage = Storage::new(None)?;
//!
//! let item = storage.add_item(NewItem::new("capital of Peru", "Lima"))?;
//!
//! // Grade on the default 1-5 scale
//! let reviewed = storage.review(item.id, 4)?;
//! println!("next due {}", reviewed.record.next_due);
//!
//! for due in storage.due_items(20)?.items {
//!     println!("{}", due.item.front);
//! }
//! ```
//!
//! The engine itself is pure: [`Scheduler`], [`HistoryReplayer`],
//! [`select_due`] and [`ReviewRecorder`] take `now` as an argument and never
//! touch storage, so they can sit behind any persistence layer.
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): bundled SQLite for the reference store
//! - `encryption`: SQLCipher instead, keyed by `CADENCE_ENCRYPTION_KEY`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod clock;
pub mod config;
pub mod error;
pub mod fsrs;
pub mod memory;
pub mod review;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, SchedulerConfig};
pub use error::{Result, SchedulerError};

// Memory types
pub use memory::{LearningItem, MemoryState, NewItem, ReviewRecord, ScheduledState};

// Scheduling
pub use fsrs::{
    map_rating, retrievability, PreviewResults, Rating, RatingScale, ScheduleOutcome, Scheduler,
};

// Review pipeline
pub use review::{
    select_due, validate_history, DueItem, DueSet, HistoryProvider, HistoryReplayer,
    RecordedReview, ReviewRecorder, Snapshot, SnapshotCache,
};

// Storage layer
pub use storage::{RebuildReport, Storage, StorageError, StoreStats};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        select_due, Clock, DueSet, HistoryReplayer, LearningItem, MemoryState, NewItem, Rating,
        RatingScale, ReviewRecord, ReviewRecorder, ScheduledState, Scheduler, SchedulerConfig,
        SchedulerError, Storage, StorageError, SystemClock,
    };
}

//! Test Data Factory
//!
//! Provides utilities for generating realistic test data:
//! - Learning items with varied text
//! - Batch generation for stress testing
//! - Pure review histories built without a store
//! - Pre-built due-set scenarios with known ordering

use std::collections::HashMap;

use cadence_core::{LearningItem, NewItem, ReviewRecord, ReviewRecorder, Scheduler, Storage};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::harness::TestDatabaseManager;

/// Factory for creating test data
///
/// # Example
///
/// ```rust,ignore
/// let db = TestDatabaseManager::new_temp();
///
/// // Create a single item
/// let item = TestDataFactory::create_item(&db.storage, "front", "back");
///
/// // Create a batch
/// let ids = TestDataFactory::create_batch(&db.storage, 100);
///
/// // Create a due-ordering scenario
/// let scenario = TestDataFactory::create_scheduling_scenario(&db);
/// ```
pub struct TestDataFactory;

/// Configuration for batch item generation
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of items to create
    pub count: usize,
    /// Prefix for the front of each item
    pub front_prefix: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            front_prefix: "Test prompt".to_string(),
        }
    }
}

/// Scenario containing related test data
#[derive(Debug)]
pub struct TestScenario {
    /// IDs of created items
    pub item_ids: Vec<Uuid>,
    /// Description of the scenario
    pub description: String,
    /// Named items for test assertions
    pub metadata: HashMap<String, Uuid>,
}

impl TestScenario {
    /// Look up a named item, panicking with the name if it is missing
    pub fn id(&self, name: &str) -> Uuid {
        *self
            .metadata
            .get(name)
            .unwrap_or_else(|| panic!("scenario has no item named {name}"))
    }
}

impl TestDataFactory {
    // ========================================================================
    // ITEM CREATION
    // ========================================================================

    /// Create a single item
    pub fn create_item(storage: &Storage, front: &str, back: &str) -> Option<LearningItem> {
        storage.add_item(NewItem::new(front, back)).ok()
    }

    /// Create `count` items with generated text
    pub fn create_batch(storage: &Storage, count: usize) -> Vec<Uuid> {
        Self::create_batch_with_config(
            storage,
            BatchConfig {
                count,
                ..Default::default()
            },
        )
    }

    /// Create items with a custom configuration
    pub fn create_batch_with_config(storage: &Storage, config: BatchConfig) -> Vec<Uuid> {
        (0..config.count)
            .filter_map(|i| {
                let front = format!("{} {}", config.front_prefix, i);
                let back = Self::lorem_content(8 + i % 5);
                Self::create_item(storage, &front, &back).map(|item| item.id)
            })
            .collect()
    }

    // ========================================================================
    // HISTORIES
    // ========================================================================

    /// Build a history in memory, each review landing exactly on the previous
    /// due date. The first review happens at `start`.
    pub fn create_history(
        scheduler: &Scheduler,
        item_id: Uuid,
        start: DateTime<Utc>,
        scores: &[i32],
    ) -> Vec<ReviewRecord> {
        let recorder = ReviewRecorder::new(scheduler.clone());
        let mut history: Vec<ReviewRecord> = Vec::with_capacity(scores.len());
        let mut at = start;

        for &score in scores {
            let record = recorder
                .record_review(item_id, &history, score, at)
                .expect("Failed to build test history");
            at = record.next_due;
            history.push(record);
        }

        history
    }

    /// Build a history with explicit gaps: each entry is a score and the time
    /// since the previous review
    pub fn create_history_with_gaps(
        scheduler: &Scheduler,
        item_id: Uuid,
        start: DateTime<Utc>,
        reviews: &[(i32, Duration)],
    ) -> Vec<ReviewRecord> {
        let recorder = ReviewRecorder::new(scheduler.clone());
        let mut history: Vec<ReviewRecord> = Vec::with_capacity(reviews.len());
        let mut at = start;

        for &(score, gap) in reviews {
            at += gap;
            let record = recorder
                .record_review(item_id, &history, score, at)
                .expect("Failed to build test history");
            history.push(record);
        }

        history
    }

    // ========================================================================
    // SCENARIOS
    // ========================================================================

    /// Five items with a known due order at the scenario's end time:
    ///
    /// - `overdue`: due a day before the end time
    /// - `due_now`: due exactly at the end time
    /// - `new_older`, `new_newer`: never reviewed, created in that order
    /// - `not_due`: reviewed Easy, due about two weeks later
    /// - `deleted`: overdue but soft-deleted
    ///
    /// Leaves the clock at the end time. Expected due order:
    /// `overdue, due_now, new_older, new_newer`.
    pub fn create_scheduling_scenario(db: &TestDatabaseManager) -> TestScenario {
        let mut metadata = HashMap::new();
        let start = db.now();

        let mut add = |name: &str| {
            let item = Self::create_item(&db.storage, name, &Self::lorem_content(6))
                .expect("Failed to create scenario item");
            metadata.insert(name.to_string(), item.id);
            item.id
        };

        let overdue = add("overdue");
        let deleted = add("deleted");
        let not_due = add("not_due");
        db.advance_hours(1);
        let new_older = add("new_older");
        db.advance_hours(1);
        let new_newer = add("new_newer");
        let due_now = add("due_now");

        // Again: one-day interval
        db.set_time(start);
        db.storage.review(overdue, 1).expect("review overdue");
        db.storage.review(deleted, 1).expect("review deleted");
        // Easy: long first interval
        db.storage.review(not_due, 5).expect("review not_due");

        db.set_time(start + Duration::days(1));
        db.storage.review(due_now, 1).expect("review due_now");
        db.storage.soft_delete_item(deleted).expect("delete");

        db.set_time(start + Duration::days(2));

        TestScenario {
            item_ids: vec![overdue, due_now, new_older, new_newer, not_due, deleted],
            description: "Overdue, due, new, future and deleted items".to_string(),
            metadata,
        }
    }

    // ========================================================================
    // TEXT
    // ========================================================================

    /// Deterministic filler text of `words` words
    pub fn lorem_content(words: usize) -> String {
        const WORDS: &[&str] = &[
            "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed",
            "do", "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna",
        ];

        (0..words)
            .map(|i| WORDS[i % WORDS.len()])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_batch() {
        let db = TestDatabaseManager::new_temp();
        let ids = TestDataFactory::create_batch(&db.storage, 12);
        assert_eq!(ids.len(), 12);
        assert_eq!(db.item_count(), 12);
    }

    #[test]
    fn test_create_history_lands_on_due_dates() {
        let scheduler = Scheduler::default();
        let start = TestDatabaseManager::start_time();
        let history = TestDataFactory::create_history(&scheduler, Uuid::new_v4(), start, &[4, 4, 4]);

        assert_eq!(history.len(), 3);
        assert_eq!(history[0].reviewed_at, start);
        assert_eq!(history[1].reviewed_at, history[0].next_due);
        assert_eq!(history[2].reviewed_at, history[1].next_due);
    }

    #[test]
    fn test_scheduling_scenario_order() {
        let db = TestDatabaseManager::new_temp();
        let scenario = TestDataFactory::create_scheduling_scenario(&db);

        let due = db.storage.due_items(10).unwrap();
        let ids: Vec<_> = due.learning_items().map(|item| item.id).collect();
        assert_eq!(
            ids,
            vec![
                scenario.id("overdue"),
                scenario.id("due_now"),
                scenario.id("new_older"),
                scenario.id("new_newer"),
            ]
        );
    }

    #[test]
    fn test_lorem_content() {
        assert_eq!(TestDataFactory::lorem_content(3), "lorem ipsum dolor");
        assert!(TestDataFactory::lorem_content(0).is_empty());
    }
}

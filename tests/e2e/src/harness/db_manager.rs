//! Test Database Manager
//!
//! Provides isolated database instances for testing:
//! - Temporary databases that are automatically cleaned up
//! - A pinned clock that only moves when the test moves it
//! - Pre-seeded databases with items in different review states
//! - Reopen and recreate for persistence and migration tests

use std::path::PathBuf;
use std::sync::Arc;

use cadence_core::{
    Clock, FixedClock, NewItem, RecordedReview, Scheduler, SchedulerConfig, Storage,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

/// Manager for test databases
///
/// Creates isolated database instances for each test to prevent interference.
/// Automatically cleans up temporary databases when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let db = TestDatabaseManager::new_temp();
///
/// let item = db.storage.add_item(NewItem::new("q", "a"))?;
/// db.storage.review(item.id, 4)?;
/// db.advance_days(3);
///
/// // Database is automatically deleted when `db` goes out of scope
/// ```
pub struct TestDatabaseManager {
    /// The storage instance
    pub storage: Storage,
    clock: Arc<FixedClock>,
    scheduler: Scheduler,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: Option<TempDir>,
    /// Path to the database file
    db_path: PathBuf,
}

impl TestDatabaseManager {
    /// Time every managed clock starts at
    pub fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    /// Create a new test database in a temporary directory
    ///
    /// The database is automatically deleted when the manager is dropped.
    pub fn new_temp() -> Self {
        Self::new_temp_with_config(SchedulerConfig::default())
    }

    /// Temporary database scheduling with `config`
    pub fn new_temp_with_config(config: SchedulerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test_cadence.db");
        let mut db = Self::open(db_path, config);
        db._temp_dir = Some(temp_dir);
        db
    }

    /// Create a test database at a specific path
    ///
    /// The database is NOT automatically deleted.
    pub fn new_at_path(path: PathBuf) -> Self {
        Self::open(path, SchedulerConfig::default())
    }

    fn open(db_path: PathBuf, config: SchedulerConfig) -> Self {
        let scheduler = Scheduler::new(config).expect("Invalid test scheduler config");
        let clock = Arc::new(FixedClock::new(Self::start_time()));
        let storage = Self::build_storage(&db_path, &scheduler, &clock);

        Self {
            storage,
            clock,
            scheduler,
            _temp_dir: None,
            db_path,
        }
    }

    fn build_storage(path: &PathBuf, scheduler: &Scheduler, clock: &Arc<FixedClock>) -> Storage {
        Storage::new(Some(path.clone()))
            .expect("Failed to create test storage")
            .with_scheduler(scheduler.clone())
            .with_clock(clock.clone())
            .with_rng_seed(7)
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    // ========================================================================
    // CLOCK
    // ========================================================================

    /// The store's current time
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    pub fn advance_hours(&self, hours: i64) {
        self.clock.advance(Duration::hours(hours));
    }

    pub fn set_time(&self, at: DateTime<Utc>) {
        self.clock.set(at);
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Check if the database has no live items
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Number of live items
    pub fn item_count(&self) -> i64 {
        self.storage.stats().map(|s| s.total_items).unwrap_or(0)
    }

    /// Review `item_id` exactly when it falls due (or now, for new items)
    pub fn review_when_due(&self, item_id: Uuid, score: i32) -> RecordedReview {
        if let Ok(Some(state)) = self.storage.item_state(item_id) {
            if state.next_due > self.now() {
                self.set_time(state.next_due);
            }
        }
        self.storage
            .review(item_id, score)
            .expect("Failed to record review")
    }

    // ========================================================================
    // SEEDING METHODS
    // ========================================================================

    /// Seed the database with a specified number of never-reviewed items
    pub fn seed_items(&self, count: usize) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(count);

        for i in 0..count {
            let input = NewItem::new(format!("Test prompt {}", i), format!("Test answer {}", i));
            if let Ok(item) = self.storage.add_item(input) {
                ids.push(item.id);
            }
            // Distinct creation times keep new-item order observable
            self.advance_hours(1);
        }

        ids
    }

    /// Seed one new, one well-learned and one struggling item, in that order
    pub fn seed_with_review_states(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();

        if let Ok(item) = self.storage.add_item(NewItem::new("New item", "never reviewed")) {
            ids.push(item.id);
        }

        if let Ok(item) = self.storage.add_item(NewItem::new("Well-learned item", "reviewed often")) {
            for score in [4, 4, 5] {
                self.review_when_due(item.id, score);
            }
            ids.push(item.id);
        }

        if let Ok(item) = self.storage.add_item(NewItem::new("Struggling item", "has lapses")) {
            for score in [1, 3, 1] {
                self.review_when_due(item.id, score);
            }
            ids.push(item.id);
        }

        ids
    }

    // ========================================================================
    // CLEANUP
    // ========================================================================

    /// Soft-delete every live item
    pub fn clear(&self) {
        // Past every possible due date, the due set is every live item
        let now = self.now();
        self.set_time(now + Duration::days(365 * 200));
        if let Ok(due) = self.storage.due_items(usize::MAX) {
            for item in due.learning_items() {
                let _ = self.storage.soft_delete_item(item.id);
            }
        }
        self.set_time(now);
    }

    /// Drop the current connections before touching the file
    fn close(&mut self) {
        self.storage = Storage::open_in_memory().expect("Failed to open placeholder storage");
    }

    /// Close and reopen the same database file (same clock and config)
    pub fn reopen(&mut self) {
        self.close();
        self.storage = Self::build_storage(&self.db_path, &self.scheduler, &self.clock);
    }

    /// Reopen with a different scheduler config
    pub fn reopen_with_config(&mut self, config: SchedulerConfig) {
        self.scheduler = Scheduler::new(config).expect("Invalid test scheduler config");
        self.reopen();
    }

    /// Delete the database file and start over (useful for testing migrations)
    pub fn recreate(&mut self) {
        self.close();
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(self.db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(self.db_path.with_extension("db-shm"));
        self.storage = Self::build_storage(&self.db_path, &self.scheduler, &self.clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_database_creation() {
        let db = TestDatabaseManager::new_temp();
        assert!(db.is_empty());
        assert!(db.path().exists());
        assert_eq!(db.now(), TestDatabaseManager::start_time());
    }

    #[test]
    fn test_seed_items() {
        let db = TestDatabaseManager::new_temp();
        let ids = db.seed_items(10);

        assert_eq!(ids.len(), 10);
        assert_eq!(db.item_count(), 10);
    }

    #[test]
    fn test_seed_with_review_states() {
        let db = TestDatabaseManager::new_temp();
        let ids = db.seed_with_review_states();

        assert_eq!(ids.len(), 3);
        assert!(db.storage.history(ids[0]).unwrap().is_empty());
        assert_eq!(db.storage.history(ids[1]).unwrap().len(), 3);
        assert_eq!(db.storage.history(ids[2]).unwrap().len(), 3);
    }

    #[test]
    fn test_clear_database() {
        let db = TestDatabaseManager::new_temp();
        db.seed_with_review_states();
        db.seed_items(5);
        assert_eq!(db.item_count(), 8);

        db.clear();
        assert!(db.is_empty());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let mut db = TestDatabaseManager::new_temp();
        let ids = db.seed_items(3);
        db.reopen();
        assert_eq!(db.item_count(), 3);
        assert!(db.storage.get_item(ids[0]).unwrap().is_some());
    }

    #[test]
    fn test_recreate_empties() {
        let mut db = TestDatabaseManager::new_temp();
        db.seed_items(3);
        db.recreate();
        assert!(db.is_empty());
    }
}

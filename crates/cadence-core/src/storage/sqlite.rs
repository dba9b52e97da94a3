//! SQLite Storage Implementation
//!
//! Reference store for the engine: learning items, the append-only review
//! log, and persisted snapshots of each item's folded memory state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::SchedulerError;
use crate::fsrs::{PreviewResults, Rating, Scheduler};
use crate::memory::{LearningItem, MemoryState, NewItem, ReviewRecord, ScheduledState};
use crate::review::{
    select_due, DueSet, HistoryProvider, RecordedReview, ReviewRecorder, Snapshot,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),
    /// Item or review not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A stored timestamp could not be parsed
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
    /// Rejected by the scheduling engine
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::FromSqlConversionFailure(_, _, source) = &e {
            if let Some(bad) = source.downcast_ref::<BadTimestamp>() {
                return StorageError::InvalidTimestamp(bad.0.clone());
            }
        }
        StorageError::Database(e)
    }
}

/// Carried inside a row conversion failure so it surfaces as `InvalidTimestamp`
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct BadTimestamp(String);

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Aggregate counts over the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Live (non-deleted) items
    pub total_items: i64,
    pub deleted_items: i64,
    /// Reviews counted toward memory state
    pub total_reviews: i64,
    /// Reviews retracted by soft deletion
    pub retracted_reviews: i64,
    /// Items due now, including never-reviewed ones
    pub due_now: usize,
    /// Items never reviewed
    pub new_items: usize,
    /// Mean estimated recall probability over reviewed items
    pub average_retrievability: Option<f64>,
    pub oldest_item: Option<DateTime<Utc>>,
    pub newest_item: Option<DateTime<Utc>>,
}

/// Outcome of [`Storage::rebuild_snapshots`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    /// Live items scanned
    pub items: usize,
    /// Snapshots written from a fresh replay
    pub written: usize,
    /// Snapshots dropped for items without reviews or deleted items
    pub removed: usize,
    /// Snapshots that no longer matched their history head or config
    pub stale: usize,
    /// Snapshots that matched their head but disagreed with the replay
    pub drifted: usize,
}

const ITEM_COLUMNS: &str = "id, front, back, created_at, deleted_at";
const RECORD_COLUMNS: &str = "id, item_id, quality, rating, reviewed_at, next_due, deleted_at";

// ============================================================================
// STORAGE
// ============================================================================

/// SQLite-backed store
///
/// Uses separate reader/writer connections for interior mutability. All
/// methods take `&self`, making Storage `Send + Sync`. Every write that
/// depends on prior history runs in one writer transaction, which gives the
/// engine the per-item serialization it requires.
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    recorder: ReviewRecorder,
    /// Serialized scheduler config; snapshots from another config are ignored
    fingerprint: String,
    clock: Arc<dyn Clock>,
    rng: Mutex<ChaCha8Rng>,
}

impl Storage {
    /// Apply PRAGMAs and optional encryption to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        #[cfg(feature = "encryption")]
        {
            if let Ok(key) = std::env::var("CADENCE_ENCRYPTION_KEY") {
                if !key.is_empty() {
                    conn.pragma_update(None, "key", &key)?;
                }
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Platform data directory location of the default database
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "cadence", "core").ok_or_else(|| {
            StorageError::Init("Could not determine project directories".to_string())
        })?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        // Restrict directory permissions to owner-only on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(data_dir, perms);
        }
        Ok(data_dir.join("cadence.db"))
    }

    /// Open (or create) a store with the default scheduler and system clock
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_path()?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let writer_conn = Connection::open(&path)?;

        // Restrict database file permissions to owner-only on Unix
        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        tracing::debug!(path = %path.display(), "Opened store");
        Ok(Self::from_connections(writer_conn, reader_conn))
    }

    /// A private in-memory store, gone when dropped
    pub fn open_in_memory() -> Result<Self> {
        // Both connections must see the same database, so use a named
        // shared-cache memory database rather than two anonymous ones.
        let uri = format!("file:cadence-{}?mode=memory&cache=shared", Uuid::new_v4());
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let writer_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open_with_flags(&uri, flags)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self::from_connections(writer_conn, reader_conn))
    }

    fn from_connections(writer: Connection, reader: Connection) -> Self {
        let recorder = ReviewRecorder::default();
        let fingerprint = Self::fingerprint_of(recorder.scheduler());
        Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            recorder,
            fingerprint,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Use a different (already validated) scheduler
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.fingerprint = Self::fingerprint_of(&scheduler);
        self.recorder = ReviewRecorder::new(scheduler);
        self
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seed the fuzz RNG for reproducible due dates
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(ChaCha8Rng::seed_from_u64(seed));
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.recorder.scheduler()
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn fingerprint_of(scheduler: &Scheduler) -> String {
        serde_json::to_string(scheduler.config()).unwrap_or_default()
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))
    }

    // ========================================================================
    // ITEMS
    // ========================================================================

    /// Create a new learning item
    pub fn add_item(&self, input: NewItem) -> Result<LearningItem> {
        let now = self.clock.now();
        let item = LearningItem::new(input.front, input.back, now);

        {
            let writer = self.writer()?;
            writer.execute(
                "INSERT INTO learning_items (id, front, back, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    item.id.to_string(),
                    item.front,
                    item.back,
                    format_timestamp(&now),
                    format_timestamp(&now),
                ],
            )?;
        }

        tracing::debug!(item_id = %item.id, "Item added");
        Ok(item)
    }

    /// Get an item by id, deleted or not
    pub fn get_item(&self, id: Uuid) -> Result<Option<LearningItem>> {
        let reader = self.reader()?;
        Ok(Self::find_item(&reader, id)?)
    }

    /// Replace an item's text. Review history is untouched.
    pub fn update_item_text(&self, id: Uuid, front: &str, back: &str) -> Result<LearningItem> {
        let now = self.clock.now();
        let writer = self.writer()?;
        let rows = writer.execute(
            "UPDATE learning_items SET front = ?1, back = ?2, updated_at = ?3
             WHERE id = ?4 AND deleted_at IS NULL",
            params![front, back, format_timestamp(&now), id.to_string()],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Self::find_item(&writer, id)?.ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Logically delete an item. Its reviews stay in the log.
    pub fn soft_delete_item(&self, id: Uuid) -> Result<bool> {
        let now = self.clock.now();
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        let rows = tx.execute(
            "UPDATE learning_items SET deleted_at = ?1, updated_at = ?1
             WHERE id = ?2 AND deleted_at IS NULL",
            params![format_timestamp(&now), id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM memory_snapshots WHERE item_id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;

        if rows > 0 {
            tracing::info!(item_id = %id, "Item deleted");
        }
        Ok(rows > 0)
    }

    fn find_item(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<LearningItem>> {
        conn.query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM learning_items WHERE id = ?1"),
            params![id.to_string()],
            row_to_item,
        )
        .optional()
    }

    fn require_live_item(conn: &Connection, id: Uuid) -> Result<LearningItem> {
        match Self::find_item(conn, id)? {
            Some(item) if !item.is_deleted() => Ok(item),
            _ => Err(StorageError::NotFound(id.to_string())),
        }
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Non-deleted reviews of an item, oldest first
    pub fn history(&self, item_id: Uuid) -> Result<Vec<ReviewRecord>> {
        let reader = self.reader()?;
        Ok(Self::load_history(&reader, item_id, false)?)
    }

    /// Every review of an item including retracted ones, oldest first
    pub fn audit_trail(&self, item_id: Uuid) -> Result<Vec<ReviewRecord>> {
        let reader = self.reader()?;
        Ok(Self::load_history(&reader, item_id, true)?)
    }

    fn load_history(
        conn: &Connection,
        item_id: Uuid,
        include_deleted: bool,
    ) -> rusqlite::Result<Vec<ReviewRecord>> {
        let filter = if include_deleted { "" } else { "AND deleted_at IS NULL" };
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM review_records
             WHERE item_id = ?1 {filter}
             ORDER BY reviewed_at ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map(params![item_id.to_string()], row_to_record)?;
        rows.collect()
    }

    fn insert_record(conn: &Connection, record: &ReviewRecord) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO review_records (id, item_id, quality, rating, reviewed_at, next_due)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.item_id.to_string(),
                record.quality,
                record.rating.as_str(),
                format_timestamp(&record.reviewed_at),
                format_timestamp(&record.next_due),
            ],
        )?;
        Ok(())
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    fn load_snapshot(conn: &Connection, item_id: Uuid) -> rusqlite::Result<Option<(Snapshot, String)>> {
        conn.query_row(
            "SELECT difficulty, stability, last_reviewed, next_due,
                    last_record_id, review_count, config_fingerprint
             FROM memory_snapshots WHERE item_id = ?1",
            params![item_id.to_string()],
            row_to_snapshot,
        )
        .optional()
        .map(Option::flatten)
    }

    fn upsert_snapshot(
        conn: &Connection,
        item_id: Uuid,
        snapshot: &Snapshot,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        let memory = &snapshot.scheduled.memory;
        conn.execute(
            "INSERT INTO memory_snapshots (
                item_id, difficulty, stability, last_reviewed, next_due,
                last_record_id, review_count, config_fingerprint, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(item_id) DO UPDATE SET
                difficulty = excluded.difficulty,
                stability = excluded.stability,
                last_reviewed = excluded.last_reviewed,
                next_due = excluded.next_due,
                last_record_id = excluded.last_record_id,
                review_count = excluded.review_count,
                config_fingerprint = excluded.config_fingerprint,
                updated_at = excluded.updated_at",
            params![
                item_id.to_string(),
                memory.difficulty,
                memory.stability,
                format_timestamp(&memory.last_reviewed),
                format_timestamp(&snapshot.scheduled.next_due),
                snapshot.last_record_id.to_string(),
                snapshot.review_count as i64,
                fingerprint,
                format_timestamp(&now),
            ],
        )?;
        Ok(())
    }

    /// A stored snapshot, if it was built from `head` under this config
    fn trusted_snapshot(&self, stored: Option<(Snapshot, String)>, head: Option<&ReviewRecord>) -> Option<ScheduledState> {
        stored
            .filter(|(snapshot, fingerprint)| *fingerprint == self.fingerprint && snapshot.matches_head(head))
            .map(|(snapshot, _)| snapshot.scheduled)
    }

    /// Memory state for an item from a trusted snapshot or a replay
    fn resolve_state(&self, conn: &Connection, item_id: Uuid, history: &[ReviewRecord]) -> Result<Option<ScheduledState>> {
        let stored = Self::load_snapshot(conn, item_id)?;
        if let Some(scheduled) = self.trusted_snapshot(stored, history.last()) {
            tracing::trace!(%item_id, "Snapshot hit");
            return Ok(Some(scheduled));
        }
        tracing::trace!(%item_id, reviews = history.len(), "Replaying history");
        Ok(self.recorder.replayer().replay(history)?)
    }

    // ========================================================================
    // REVIEWS
    // ========================================================================

    /// Record a review of `item_id` with a user score at the clock's `now`.
    ///
    /// Loads history and the snapshot, schedules, appends the record, and
    /// refreshes the snapshot inside one writer transaction. Nothing is
    /// written if any step fails.
    pub fn review(&self, item_id: Uuid, score: i32) -> Result<RecordedReview> {
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        // Read the clock under the writer lock so commit order is time order
        let now = self.clock.now();

        Self::require_live_item(&tx, item_id)?;
        let history = Self::load_history(&tx, item_id, false)?;
        let prior = self.resolve_state(&tx, item_id, &history)?;

        let recorded = if self.scheduler().config().fuzz_enabled {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| StorageError::Init("RNG lock poisoned".into()))?;
            self.recorder
                .review_from_snapshot_with_rng(item_id, prior, score, now, &mut *rng)?
        } else {
            self.recorder.review_from_snapshot(item_id, prior, score, now)?
        };

        Self::insert_record(&tx, &recorded.record)?;
        Self::upsert_snapshot(
            &tx,
            item_id,
            &Snapshot {
                scheduled: recorded.scheduled,
                last_record_id: recorded.record.id,
                review_count: history.len() + 1,
            },
            &self.fingerprint,
            now,
        )?;
        tx.commit()?;

        tracing::info!(
            %item_id,
            rating = %recorded.record.rating,
            next_due = %recorded.record.next_due,
            "Review stored"
        );
        Ok(recorded)
    }

    /// Retract a review. The item's state is replayed without it from now on.
    pub fn soft_delete_review(&self, record_id: Uuid) -> Result<bool> {
        let now = self.clock.now();
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;

        let item_id: Option<String> = tx
            .query_row(
                "SELECT item_id FROM review_records WHERE id = ?1 AND deleted_at IS NULL",
                params![record_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(item_id) = item_id else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE review_records SET deleted_at = ?1 WHERE id = ?2",
            params![format_timestamp(&now), record_id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM memory_snapshots WHERE item_id = ?1",
            params![item_id],
        )?;
        tx.commit()?;

        tracing::info!(%record_id, %item_id, "Review retracted");
        Ok(true)
    }

    /// Current scheduled state of an item; `None` if never reviewed
    pub fn item_state(&self, item_id: Uuid) -> Result<Option<ScheduledState>> {
        let reader = self.reader()?;
        if Self::find_item(&reader, item_id)?.is_none() {
            return Err(StorageError::NotFound(item_id.to_string()));
        }
        let history = Self::load_history(&reader, item_id, false)?;
        self.resolve_state(&reader, item_id, &history)
    }

    /// What each rating would schedule if the item were reviewed now
    pub fn preview(&self, item_id: Uuid) -> Result<PreviewResults> {
        let state = self.item_state(item_id)?;
        let now = self.clock.now();
        Ok(self
            .scheduler()
            .preview(state.as_ref().map(|s| &s.memory), now))
    }

    // ========================================================================
    // DUE SET
    // ========================================================================

    /// Items due at the clock's `now`, at most `limit`
    pub fn due_items(&self, limit: usize) -> Result<DueSet> {
        let now = self.clock.now();
        let candidates = {
            let reader = self.reader()?;
            self.load_schedules(&reader)?
        };
        Ok(select_due(candidates, now, limit))
    }

    /// Every live item with its scheduled state
    fn load_schedules(&self, conn: &Connection) -> Result<Vec<(LearningItem, Option<ScheduledState>)>> {
        let mut stmt = conn.prepare(
            "SELECT i.id, i.front, i.back, i.created_at, i.deleted_at,
                    s.difficulty, s.stability, s.last_reviewed, s.next_due,
                    s.last_record_id, s.review_count, s.config_fingerprint,
                    (SELECT r.id FROM review_records r
                      WHERE r.item_id = i.id AND r.deleted_at IS NULL
                      ORDER BY r.reviewed_at DESC, r.rowid DESC
                      LIMIT 1) AS head_id
             FROM learning_items i
             LEFT JOIN memory_snapshots s ON s.item_id = i.id
             WHERE i.deleted_at IS NULL",
        )?;

        let rows = stmt.query_map([], |row| {
            let head_id: Option<String> = row.get("head_id")?;
            let head_id = head_id.map(|s| parse_uuid(&s, "head_id")).transpose()?;
            Ok((row_to_item(row)?, row_to_snapshot(row)?, head_id))
        })?;

        let mut result = Vec::new();
        let mut replayed = 0usize;
        for row in rows {
            let (item, stored, head_id) = row?;
            let schedule = match head_id {
                None => None,
                Some(head_id) => {
                    let trusted = stored
                        .filter(|(snapshot, fingerprint)| {
                            *fingerprint == self.fingerprint && snapshot.last_record_id == head_id
                        })
                        .map(|(snapshot, _)| snapshot.scheduled);
                    match trusted {
                        Some(scheduled) => Some(scheduled),
                        None => {
                            replayed += 1;
                            let history = Self::load_history(conn, item.id, false)?;
                            self.recorder.replayer().replay(&history)?
                        }
                    }
                }
            };
            result.push((item, schedule));
        }

        if replayed > 0 {
            tracing::debug!(replayed, "Replayed items without a usable snapshot");
        }
        Ok(result)
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Replay every history and rewrite all snapshots.
    ///
    /// Reports snapshots that were stale (wrong head or config) and snapshots
    /// that claimed the right head but held a different state.
    pub fn rebuild_snapshots(&self) -> Result<RebuildReport> {
        let now = self.clock.now();
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        let mut report = RebuildReport::default();

        let item_ids: Vec<Uuid> = {
            let mut stmt = tx.prepare("SELECT id FROM learning_items WHERE deleted_at IS NULL")?;
            let rows = stmt.query_map([], |row| {
                let id: String = row.get(0)?;
                parse_uuid(&id, "id")
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        for item_id in item_ids {
            report.items += 1;
            let history = Self::load_history(&tx, item_id, false)?;
            let stored = Self::load_snapshot(&tx, item_id)?;

            let Some((scheduled, head)) = self.recorder.replayer().replay(&history)?.zip(history.last()) else {
                if stored.is_some() {
                    tx.execute(
                        "DELETE FROM memory_snapshots WHERE item_id = ?1",
                        params![item_id.to_string()],
                    )?;
                    report.removed += 1;
                }
                continue;
            };

            if let Some((snapshot, fingerprint)) = &stored {
                if *fingerprint != self.fingerprint || !snapshot.matches_head(Some(head)) {
                    report.stale += 1;
                } else if snapshot.scheduled != scheduled {
                    report.drifted += 1;
                    tracing::warn!(%item_id, "Snapshot drifted from replayed history");
                }
            }

            Self::upsert_snapshot(
                &tx,
                item_id,
                &Snapshot {
                    scheduled,
                    last_record_id: head.id,
                    review_count: history.len(),
                },
                &self.fingerprint,
                now,
            )?;
            report.written += 1;
        }

        report.removed += tx.execute(
            "DELETE FROM memory_snapshots WHERE item_id IN
                (SELECT id FROM learning_items WHERE deleted_at IS NOT NULL)",
            [],
        )?;
        tx.commit()?;

        tracing::info!(
            items = report.items,
            written = report.written,
            stale = report.stale,
            drifted = report.drifted,
            "Snapshots rebuilt"
        );
        Ok(report)
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let now = self.clock.now();
        let reader = self.reader()?;

        let total_items: i64 = reader.query_row(
            "SELECT COUNT(*) FROM learning_items WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        let deleted_items: i64 = reader.query_row(
            "SELECT COUNT(*) FROM learning_items WHERE deleted_at IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        let total_reviews: i64 = reader.query_row(
            "SELECT COUNT(*) FROM review_records WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        let retracted_reviews: i64 = reader.query_row(
            "SELECT COUNT(*) FROM review_records WHERE deleted_at IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        let (oldest, newest): (Option<String>, Option<String>) = reader.query_row(
            "SELECT MIN(created_at), MAX(created_at) FROM learning_items WHERE deleted_at IS NULL",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let schedules = self.load_schedules(&reader)?;
        drop(reader);

        let new_items = schedules.iter().filter(|(_, s)| s.is_none()).count();
        let retrievabilities: Vec<f64> = schedules
            .iter()
            .filter_map(|(_, s)| s.as_ref())
            .map(|s| self.scheduler().retrievability_at(&s.memory, now))
            .collect();
        let average_retrievability = if retrievabilities.is_empty() {
            None
        } else {
            Some(retrievabilities.iter().sum::<f64>() / retrievabilities.len() as f64)
        };
        let due_now = select_due(schedules, now, 0).total_due;

        Ok(StoreStats {
            total_items,
            deleted_items,
            total_reviews,
            retracted_reviews,
            due_now,
            new_items,
            average_retrievability,
            oldest_item: oldest.map(|s| parse_timestamp(&s, "created_at")).transpose()?,
            newest_item: newest.map(|s| parse_timestamp(&s, "created_at")).transpose()?,
        })
    }
}

impl HistoryProvider for Storage {
    type Error = StorageError;

    fn history(&self, item_id: Uuid) -> Result<Vec<ReviewRecord>> {
        Storage::history(self, item_id)
    }
}

// ============================================================================
// ROW CONVERSION
// ============================================================================

/// Fixed-width RFC3339 so text order matches time order
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

/// Parse RFC3339 timestamp
fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(BadTimestamp(format!("{} '{}': {}", field_name, value, e))),
            )
        })
}

fn parse_uuid(value: &str, field_name: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| conversion_error(format!("Invalid {} '{}': {}", field_name, value, e)))
}

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<LearningItem> {
    let id: String = row.get("id")?;
    let created_at: String = row.get("created_at")?;
    let deleted_at: Option<String> = row.get("deleted_at")?;

    Ok(LearningItem {
        id: parse_uuid(&id, "id")?,
        front: row.get("front")?,
        back: row.get("back")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        deleted_at: deleted_at
            .map(|s| parse_timestamp(&s, "deleted_at"))
            .transpose()?,
    })
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ReviewRecord> {
    let id: String = row.get("id")?;
    let item_id: String = row.get("item_id")?;
    let rating: String = row.get("rating")?;
    let reviewed_at: String = row.get("reviewed_at")?;
    let next_due: String = row.get("next_due")?;
    let deleted_at: Option<String> = row.get("deleted_at")?;

    Ok(ReviewRecord {
        id: parse_uuid(&id, "id")?,
        item_id: parse_uuid(&item_id, "item_id")?,
        quality: row.get("quality")?,
        rating: rating.parse::<Rating>().map_err(conversion_error)?,
        reviewed_at: parse_timestamp(&reviewed_at, "reviewed_at")?,
        next_due: parse_timestamp(&next_due, "next_due")?,
        deleted_at: deleted_at
            .map(|s| parse_timestamp(&s, "deleted_at"))
            .transpose()?,
    })
}

/// Snapshot columns, `None` when the row has no snapshot (left join)
fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<Option<(Snapshot, String)>> {
    let Some(difficulty) = row.get::<_, Option<f64>>("difficulty")? else {
        return Ok(None);
    };
    let last_reviewed: String = row.get("last_reviewed")?;
    let next_due: String = row.get("next_due")?;
    let last_record_id: String = row.get("last_record_id")?;
    let review_count: i64 = row.get("review_count")?;

    let snapshot = Snapshot {
        scheduled: ScheduledState {
            memory: MemoryState {
                difficulty,
                stability: row.get("stability")?,
                last_reviewed: parse_timestamp(&last_reviewed, "last_reviewed")?,
            },
            next_due: parse_timestamp(&next_due, "next_due")?,
        },
        last_record_id: parse_uuid(&last_record_id, "last_record_id")?,
        review_count: review_count.max(0) as usize,
    };
    Ok(Some((snapshot, row.get("config_fingerprint")?)))
}

// ============================================================================
// TESTS
// ============================================================================

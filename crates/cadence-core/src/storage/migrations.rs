//! Database Migrations
//!
//! Schema migration definitions for the reference store.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: learning items and review records",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Memory-state snapshots keyed by history head",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS learning_items (
    id TEXT PRIMARY KEY,
    front TEXT NOT NULL,
    back TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_items_created ON learning_items(created_at);
CREATE INDEX IF NOT EXISTS idx_items_deleted ON learning_items(deleted_at);

-- Append-only review log; corrections soft-delete, never rewrite
CREATE TABLE IF NOT EXISTS review_records (
    id TEXT PRIMARY KEY,
    item_id TEXT NOT NULL REFERENCES learning_items(id) ON DELETE CASCADE,
    quality INTEGER NOT NULL,
    rating TEXT NOT NULL,
    reviewed_at TEXT NOT NULL,
    next_due TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_reviews_item_time ON review_records(item_id, reviewed_at);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Snapshot table
const MIGRATION_V2_UP: &str = r#"
-- Cached fold of each item's history. Only trusted while last_record_id is
-- still the newest non-deleted review and the config fingerprint matches.
CREATE TABLE IF NOT EXISTS memory_snapshots (
    item_id TEXT PRIMARY KEY REFERENCES learning_items(id) ON DELETE CASCADE,
    difficulty REAL NOT NULL,
    stability REAL NOT NULL,
    last_reviewed TEXT NOT NULL,
    next_due TEXT NOT NULL,
    last_record_id TEXT NOT NULL,
    review_count INTEGER NOT NULL,
    config_fingerprint TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_next_due ON memory_snapshots(next_due);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

//! Storage Module
//!
//! SQLite-based reference store with:
//! - Append-only review log with soft-delete corrections
//! - Persisted memory-state snapshots, trusted only while the history head matches
//! - Versioned schema migrations

mod migrations;
mod sqlite;

pub use migrations::{apply_migrations, Migration, MIGRATIONS};
pub use sqlite::{RebuildReport, Result, Storage, StorageError, StoreStats};

//! Test harness: isolated databases with a controllable clock

mod db_manager;

pub use db_manager::TestDatabaseManager;

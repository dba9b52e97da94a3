//! Test data generation

mod fixtures;

pub use fixtures::{BatchConfig, TestDataFactory, TestScenario};

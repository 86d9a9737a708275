//! Deterministic, pure logic shared by the task runner.
//!
//! Core modules must be free of I/O side effects. They operate on the parsed
//! task file and return deterministic outputs suitable for tests.

pub mod invariants;
pub mod planner;
pub mod render;
pub mod types;

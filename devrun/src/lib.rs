//! Fail-fast developer task runner.
//!
//! Tasks are declared in a TOML task file (`devrun.toml`). Each task wraps at
//! most one action, an external command or a path removal, and may name
//! prerequisites. Running a target executes its prerequisites depth-first in
//! declared order, one process at a time, and stops at the first failure.
//!
//! - **[`core`]**: Pure, deterministic logic (invariants, planning, templating).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (task file, processes, filesystem).
//!   Isolated behind [`io::executor::TaskExecutor`] so tests can script outcomes.
//!
//! Orchestration modules ([`pipeline`], [`plan`], [`validate`], [`list`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod list;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;

//! Stable exit codes for devrun CLI commands.
//!
//! A failing task's own exit code is passed through unchanged, so CI sees
//! exactly what the tool reported. The constants below cover the cases where
//! there is no tool exit code to forward.

use crate::core::types::FailureKind;

/// Every requested task succeeded.
pub const OK: i32 = 0;
/// Failure with no better code (e.g. non-unix abnormal termination).
pub const FAILED: i32 = 1;
/// Invalid task file, unknown target, or other runner error.
pub const INVALID: i32 = 2;
/// A task exceeded its `timeout_secs`.
pub const TIMED_OUT: i32 = 124;
/// A task's program could not be started.
pub const SPAWN_FAILED: i32 = 127;
/// Added to the signal number when a tool is killed by a signal.
pub const SIGNAL_BASE: i32 = 128;

/// Process exit code for a failed task.
pub fn for_failure(kind: &FailureKind) -> i32 {
    match kind {
        FailureKind::Exit { code } if *code != 0 => *code,
        FailureKind::Exit { .. } => FAILED,
        FailureKind::Signal { signal } => SIGNAL_BASE + signal,
        FailureKind::TimedOut { .. } => TIMED_OUT,
        FailureKind::Spawn { .. } => SPAWN_FAILED,
        FailureKind::Io { .. } | FailureKind::PrerequisiteFailed { .. } => FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_exit_codes_pass_through() {
        assert_eq!(for_failure(&FailureKind::Exit { code: 5 }), 5);
        assert_eq!(for_failure(&FailureKind::Signal { signal: 9 }), 137);
        assert_eq!(
            for_failure(&FailureKind::TimedOut { timeout_secs: 1 }),
            TIMED_OUT
        );
        assert_eq!(
            for_failure(&FailureKind::Spawn {
                message: "poetry: not found".to_string()
            }),
            SPAWN_FAILED
        );
    }
}

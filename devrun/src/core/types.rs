//! Shared deterministic types for the task runner.
//!
//! These types define stable contracts between planning, execution and
//! reporting. They carry no I/O handles and serialize deterministically.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A fully rendered task action, ready to hand to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Spawn one external program.
    Command(CommandSpec),
    /// Remove paths relative to the project root, ignoring missing ones.
    Remove { paths: Vec<String> },
}

/// Rendered external invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program followed by its arguments. Never empty.
    pub argv: Vec<String>,
    /// Working directory relative to the project root.
    pub cwd: Option<String>,
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

impl fmt::Display for Action {
    /// Shell-like echo of the action, as printed before it runs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Command(spec) => {
                let words: Vec<String> = spec.argv.iter().map(|arg| quote_word(arg)).collect();
                write!(f, "{}", words.join(" "))
            }
            Action::Remove { paths } => {
                let words: Vec<String> = paths.iter().map(|path| quote_word(path)).collect();
                write!(f, "rm -rf {}", words.join(" "))
            }
        }
    }
}

fn quote_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Final status of one planned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Action (if any) completed successfully.
    Passed,
    /// Action failed, or a prerequisite did and the task never started.
    Failed,
    /// Never started because an unrelated earlier task failed.
    NotRun,
}

/// Why a task's action failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Tool exited with a non-zero status.
    Exit { code: i32 },
    /// Tool was terminated by a signal.
    Signal { signal: i32 },
    /// Tool exceeded its `timeout_secs` and was killed.
    TimedOut { timeout_secs: u64 },
    /// Program could not be started (not installed, not executable, ...).
    Spawn { message: String },
    /// Runner-side action failed (e.g. a path could not be removed).
    Io { message: String },
    /// Not started because `task`, a direct or indirect prerequisite, failed.
    PrerequisiteFailed { task: String },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Exit { code } => write!(f, "exited with status {code}"),
            FailureKind::Signal { signal } => write!(f, "terminated by signal {signal}"),
            FailureKind::TimedOut { timeout_secs } => {
                write!(f, "timed out after {timeout_secs}s")
            }
            FailureKind::Spawn { message } => write!(f, "could not start: {message}"),
            FailureKind::Io { message } => write!(f, "{message}"),
            FailureKind::PrerequisiteFailed { task } => {
                write!(f, "prerequisite '{task}' failed")
            }
        }
    }
}

/// Outcome of executing a single action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Success,
    Failure(FailureKind),
}

/// Per-task record of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub name: String,
    pub status: TaskStatus,
    /// Exit code of the tool; `None` for aggregates, removals and unstarted tasks.
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub duration_ms: Option<u64>,
}

impl TaskReport {
    /// A task that depends on `failed` and so never started.
    pub fn prerequisite_failed(name: &str, failed: &str) -> Self {
        Self {
            name: name.to_string(),
            status: TaskStatus::Failed,
            exit_code: None,
            failure: Some(FailureKind::PrerequisiteFailed {
                task: failed.to_string(),
            }),
            duration_ms: None,
        }
    }

    pub fn not_run(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: TaskStatus::NotRun,
            exit_code: None,
            failure: None,
            duration_ms: None,
        }
    }
}

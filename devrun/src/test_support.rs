//! Test-only helpers: task builders, a scripted executor and scratch projects.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::{ExecOutcome, FailureKind};
use crate::io::config::DEFAULT_TASK_FILE;
use crate::io::executor::{ExecRequest, TaskExecutor};
use crate::tasks::{Task, TaskFile};

/// Task with a single `run` action.
pub fn command(argv: &[&str]) -> Task {
    Task {
        run: Some(argv.iter().map(|arg| arg.to_string()).collect()),
        ..Task::default()
    }
}

/// Task with prerequisites and no action.
pub fn aggregate(depends: &[&str]) -> Task {
    Task {
        depends: depends.iter().map(|dep| dep.to_string()).collect(),
        ..Task::default()
    }
}

/// Task with a single `remove` action.
pub fn remove(paths: &[&str]) -> Task {
    Task {
        remove: Some(paths.iter().map(|path| path.to_string()).collect()),
        ..Task::default()
    }
}

pub fn task_map(tasks: Vec<(&str, Task)>) -> BTreeMap<String, Task> {
    tasks
        .into_iter()
        .map(|(name, task)| (name.to_string(), task))
        .collect()
}

/// Task file with default settings (default target `all`) and no vars.
pub fn task_file(tasks: Vec<(&str, Task)>) -> TaskFile {
    TaskFile {
        tasks: task_map(tasks),
        ..TaskFile::default()
    }
}

/// Executor that records requests and returns scripted outcomes.
///
/// Tasks without a scripted failure succeed.
#[derive(Default)]
pub struct ScriptedExecutor {
    failures: HashMap<String, FailureKind>,
    requests: RefCell<Vec<ExecRequest>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `task` fail with `kind` every time it runs.
    pub fn fail(mut self, task: &str, kind: FailureKind) -> Self {
        self.failures.insert(task.to_string(), kind);
        self
    }

    /// Names of executed tasks, in order.
    pub fn executed(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.task.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.borrow().clone()
    }
}

impl TaskExecutor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<ExecOutcome> {
        self.requests.borrow_mut().push(request.clone());
        Ok(match self.failures.get(&request.task) {
            Some(kind) => ExecOutcome::Failure(kind.clone()),
            None => ExecOutcome::Success,
        })
    }
}

/// Scratch project directory, removed on drop.
pub struct TestProject {
    dir: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp project")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `devrun.toml` at the project root.
    pub fn write_task_file(&self, contents: &str) -> Result<()> {
        self.write(DEFAULT_TASK_FILE, contents)
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.dir.path().join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}

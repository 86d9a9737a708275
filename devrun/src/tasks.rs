//! Task file model (`devrun.toml`) and the built-in default workflow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parsed task file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TaskFile {
    pub settings: Settings,
    /// Template variables available to `run`, `env` and `cwd` as `{{ name }}`.
    pub vars: BTreeMap<String, String>,
    pub tasks: BTreeMap<String, Task>,
}

/// Runner settings (`[settings]`). Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Target used when `devrun run` is given no targets.
    pub default_target: String,

    pub output: OutputMode,

    /// Capture mode: bytes of stdout/stderr kept per stream.
    pub output_limit_bytes: usize,

    /// Capture mode: per-task log directory, relative to the project root.
    pub log_dir: String,

    /// Write a JSON run report here after every `devrun run`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_target: "all".to_string(),
            output: OutputMode::Inherit,
            output_limit_bytes: 1_000_000,
            log_dir: ".devrun/logs".to_string(),
            report_path: None,
        }
    }
}

/// How child process output reaches the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Child writes straight to the terminal.
    #[default]
    Inherit,
    /// Child output is captured to a log file and replayed on failure.
    Capture,
}

/// A named unit of work: at most one action plus ordered prerequisites.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Task {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,

    /// Program and arguments of one external invocation. No shell involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<Vec<String>>,

    /// Paths removed with `rm -rf` semantics, relative to the project root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Task {
    /// True when the task has no action of its own.
    pub fn is_aggregate(&self) -> bool {
        self.run.is_none() && self.remove.is_none()
    }
}

/// The combadge developer workflow.
///
/// `devrun run` with no task file on disk behaves like `make all` did for the
/// project: install, lint, test, build, docs.
pub fn default_task_file() -> TaskFile {
    let mut vars = BTreeMap::new();
    vars.insert("package".to_string(), "combadge".to_string());
    vars.insert("tests".to_string(), "tests".to_string());

    let mut tasks = BTreeMap::new();
    let mut add = |name: &str, task: Task| {
        tasks.insert(name.to_string(), task);
    };

    add(
        "all",
        aggregate(
            "Install, lint, test, build and document",
            &["install", "lint", "test", "build", "docs"],
        ),
    );
    add(
        "clean",
        Task {
            desc: Some("Remove caches and build artifacts".to_string()),
            remove: Some(
                [
                    ".mypy_cache",
                    ".pytest_cache",
                    ".ruff_cache",
                    ".coverage",
                    "coverage.xml",
                    "dist",
                    "_site",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
            ),
            ..Task::default()
        },
    );
    add(
        "install",
        command(
            "Install dependencies including extras, dev and docs groups",
            &[
                "poetry",
                "install",
                "--all-extras",
                "--with",
                "dev",
                "--with",
                "docs",
            ],
        ),
    );
    add("check", aggregate("Lint and test", &["lint", "test"]));
    add(
        "lint",
        aggregate("Run style and type checks", &["lint/ruff", "lint/mypy"]),
    );
    add(
        "lint/ruff",
        command(
            "Style check on sources and tests",
            &[
                "poetry",
                "run",
                "ruff",
                "check",
                "{{ package }}",
                "{{ tests }}",
            ],
        ),
    );
    add(
        "lint/mypy",
        command(
            "Type check on sources and tests",
            &["poetry", "run", "mypy", "{{ package }}", "{{ tests }}"],
        ),
    );
    add("format", aggregate("Auto-fix style", &["format/ruff"]));
    add(
        "format/ruff",
        command(
            "Apply style auto-fixes in place",
            &[
                "poetry",
                "run",
                "ruff",
                "format",
                "{{ package }}",
                "{{ tests }}",
            ],
        ),
    );
    add(
        "test",
        command(
            "Run the test suite",
            &["poetry", "run", "pytest", "{{ tests }}"],
        ),
    );
    add(
        "build",
        command("Build the distributable package", &["poetry", "build"]),
    );
    add(
        "docs",
        command(
            "Build the documentation site into _site",
            &["poetry", "run", "mkdocs", "build", "--site-dir", "_site"],
        ),
    );

    TaskFile {
        settings: Settings::default(),
        vars,
        tasks,
    }
}

fn command(desc: &str, argv: &[&str]) -> Task {
    Task {
        desc: Some(desc.to_string()),
        run: Some(argv.iter().map(|arg| arg.to_string()).collect()),
        ..Task::default()
    }
}

fn aggregate(desc: &str, depends: &[&str]) -> Task {
    Task {
        desc: Some(desc.to_string()),
        depends: depends.iter().map(|dep| dep.to_string()).collect(),
        ..Task::default()
    }
}

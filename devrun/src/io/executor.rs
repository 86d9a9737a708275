//! Executor abstraction for task actions.
//!
//! The [`TaskExecutor`] trait decouples the pipeline from real process
//! execution. Tests use scripted executors that return predetermined outcomes
//! without spawning anything.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::types::{Action, CommandSpec, ExecOutcome, FailureKind};
use crate::io::clean::remove_paths;
use crate::io::process::{CommandOutput, OutputCapture, SpawnError, run_command};
use crate::tasks::{OutputMode, Settings};

/// How an executor should treat child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub mode: OutputMode,
    pub limit_bytes: usize,
    /// Absolute directory for capture-mode task logs.
    pub log_dir: PathBuf,
}

impl OutputSettings {
    pub fn from_settings(settings: &Settings, root: &Path) -> Self {
        Self {
            mode: settings.output,
            limit_bytes: settings.output_limit_bytes,
            log_dir: root.join(&settings.log_dir),
        }
    }
}

/// Parameters for one action invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Task name, used for logs and diagnostics.
    pub task: String,
    /// Project root: default working directory and base for relative paths.
    pub root: PathBuf,
    pub action: Action,
    pub output: OutputSettings,
}

/// Abstraction over action execution backends.
///
/// `Ok(ExecOutcome::Failure(..))` means the task failed; `Err` means the
/// runner itself could not carry on (e.g. a log could not be written).
pub trait TaskExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<ExecOutcome>;
}

/// Executor that spawns real processes and touches the real filesystem.
pub struct ProcessExecutor;

impl TaskExecutor for ProcessExecutor {
    #[instrument(skip_all, fields(task = %request.task))]
    fn exec(&self, request: &ExecRequest) -> Result<ExecOutcome> {
        match &request.action {
            Action::Command(spec) => exec_command(request, spec),
            Action::Remove { paths } => match remove_paths(&request.root, paths) {
                Ok(removed) => {
                    debug!(removed = removed.len(), "remove finished");
                    Ok(ExecOutcome::Success)
                }
                Err(err) => {
                    info!(err = %format!("{err:#}"), "remove failed");
                    Ok(ExecOutcome::Failure(FailureKind::Io {
                        message: format!("{err:#}"),
                    }))
                }
            },
        }
    }
}

fn exec_command(request: &ExecRequest, spec: &CommandSpec) -> Result<ExecOutcome> {
    let workdir = match &spec.cwd {
        Some(cwd) => request.root.join(cwd),
        None => request.root.clone(),
    };
    info!(workdir = %workdir.display(), program = spec.program(), "starting task command");

    let mut cmd = Command::new(spec.program());
    cmd.args(spec.args()).current_dir(&workdir).envs(&spec.env);

    let capture = match request.output.mode {
        OutputMode::Inherit => OutputCapture::Inherit,
        OutputMode::Capture => OutputCapture::Capture {
            limit_bytes: request.output.limit_bytes,
        },
    };

    let output = match run_command(cmd, spec.timeout, capture) {
        Ok(output) => output,
        Err(err) => {
            if let Some(spawn) = err.downcast_ref::<SpawnError>() {
                info!(err = %spawn, "could not start task command");
                return Ok(ExecOutcome::Failure(FailureKind::Spawn {
                    message: spawn.to_string(),
                }));
            }
            return Err(err).with_context(|| format!("run task '{}'", request.task));
        }
    };

    let outcome = classify(&output, spec);

    if request.output.mode == OutputMode::Capture {
        let log_path = task_log_path(&request.output.log_dir, &request.task);
        write_task_log(&log_path, &request.task, &output)?;
        if outcome != ExecOutcome::Success {
            replay_output(&output).context("replay captured output")?;
        }
    }

    match &outcome {
        ExecOutcome::Success => debug!("task command succeeded"),
        ExecOutcome::Failure(kind) => info!(failure = %kind, "task command failed"),
    }
    Ok(outcome)
}

fn classify(output: &CommandOutput, spec: &CommandSpec) -> ExecOutcome {
    if output.timed_out {
        let timeout_secs = spec.timeout.map(|t| t.as_secs()).unwrap_or_default();
        return ExecOutcome::Failure(FailureKind::TimedOut { timeout_secs });
    }
    if output.status.success() {
        return ExecOutcome::Success;
    }
    if let Some(code) = output.status.code() {
        return ExecOutcome::Failure(FailureKind::Exit { code });
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = output.status.signal() {
            return ExecOutcome::Failure(FailureKind::Signal { signal });
        }
    }
    ExecOutcome::Failure(FailureKind::Exit { code: 1 })
}

/// Log file for a task: slashes in the name become dashes.
pub fn task_log_path(log_dir: &Path, task: &str) -> PathBuf {
    log_dir.join(format!("{}.log", task.replace('/', "-")))
}

fn write_task_log(path: &Path, task: &str, output: &CommandOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create task log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice(task));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice(task));
    if output.timed_out {
        buf.push_str("\n[task timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write task log {}", path.display()))
}

/// Put a failed tool's own diagnostics in front of the user.
fn replay_output(output: &CommandOutput) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&output.stdout)?;
    stdout.flush()?;
    let mut stderr = std::io::stderr().lock();
    stderr.write_all(&output.stderr)?;
    stderr.flush()?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn request(root: &Path, mode: OutputMode, argv: &[&str]) -> ExecRequest {
        ExecRequest {
            task: "lint/ruff".to_string(),
            root: root.to_path_buf(),
            action: Action::Command(CommandSpec {
                argv: argv.iter().map(|arg| arg.to_string()).collect(),
                cwd: None,
                env: BTreeMap::new(),
                timeout: None,
            }),
            output: OutputSettings {
                mode,
                limit_bytes: 1000,
                log_dir: root.join("logs"),
            },
        }
    }

    #[test]
    fn non_zero_exit_carries_the_tool_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = ProcessExecutor
            .exec(&request(temp.path(), OutputMode::Inherit, &["sh", "-c", "exit 4"]))
            .expect("exec");
        assert_eq!(outcome, ExecOutcome::Failure(FailureKind::Exit { code: 4 }));
    }

    #[test]
    fn runs_in_cwd_with_env() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("sub")).expect("mkdir");
        let mut req = request(
            temp.path(),
            OutputMode::Inherit,
            &["sh", "-c", "printf %s \"$GREETING\" > out.txt"],
        );
        if let Action::Command(spec) = &mut req.action {
            spec.cwd = Some("sub".to_string());
            spec.env.insert("GREETING".to_string(), "hi".to_string());
        }

        let outcome = ProcessExecutor.exec(&req).expect("exec");
        assert_eq!(outcome, ExecOutcome::Success);
        let written = fs::read_to_string(temp.path().join("sub/out.txt")).expect("read");
        assert_eq!(written, "hi");
    }

    #[test]
    fn capture_mode_writes_task_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let req = request(
            temp.path(),
            OutputMode::Capture,
            &["sh", "-c", "echo checked; echo warned >&2"],
        );

        let outcome = ProcessExecutor.exec(&req).expect("exec");
        assert_eq!(outcome, ExecOutcome::Success);
        let log = fs::read_to_string(temp.path().join("logs/lint-ruff.log")).expect("read log");
        assert!(log.contains("checked"));
        assert!(log.contains("warned"));
    }

    #[test]
    fn capture_mode_logs_failures_with_truncation_notice() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut req = request(
            temp.path(),
            OutputMode::Capture,
            &["sh", "-c", "printf 0123456789; echo boom >&2; exit 3"],
        );
        req.output.limit_bytes = 4;

        let outcome = ProcessExecutor.exec(&req).expect("exec");
        assert_eq!(outcome, ExecOutcome::Failure(FailureKind::Exit { code: 3 }));
        let log = fs::read_to_string(temp.path().join("logs/lint-ruff.log")).expect("read log");
        assert!(log.contains("0123"), "{log}");
        assert!(log.contains("[lint/ruff stdout truncated 6 bytes]"), "{log}");
        assert!(log.contains("boom"), "{log}");
    }

    #[test]
    fn killed_by_signal_is_classified_as_signal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = ProcessExecutor
            .exec(&request(
                temp.path(),
                OutputMode::Inherit,
                &["sh", "-c", "kill -9 $$"],
            ))
            .expect("exec");
        assert_eq!(
            outcome,
            ExecOutcome::Failure(FailureKind::Signal { signal: 9 })
        );
    }

    #[test]
    fn timeout_is_reported_as_timed_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut req = request(temp.path(), OutputMode::Inherit, &["sleep", "5"]);
        if let Action::Command(spec) = &mut req.action {
            spec.timeout = Some(Duration::from_millis(100));
        }
        let outcome = ProcessExecutor.exec(&req).expect("exec");
        assert_eq!(
            outcome,
            ExecOutcome::Failure(FailureKind::TimedOut { timeout_secs: 0 })
        );
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = ProcessExecutor
            .exec(&request(
                temp.path(),
                OutputMode::Inherit,
                &["devrun-definitely-not-installed"],
            ))
            .expect("exec");
        assert!(matches!(
            outcome,
            ExecOutcome::Failure(FailureKind::Spawn { .. })
        ));
    }

    #[test]
    fn remove_action_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("dist")).expect("mkdir");
        let req = ExecRequest {
            action: Action::Remove {
                paths: vec!["dist".to_string(), "_site".to_string()],
            },
            ..request(temp.path(), OutputMode::Inherit, &["unused"])
        };

        assert_eq!(ProcessExecutor.exec(&req).expect("first"), ExecOutcome::Success);
        assert_eq!(ProcessExecutor.exec(&req).expect("second"), ExecOutcome::Success);
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn log_path_flattens_task_names() {
        assert_eq!(
            task_log_path(Path::new("/logs"), "lint/mypy"),
            PathBuf::from("/logs/lint-mypy.log")
        );
    }
}

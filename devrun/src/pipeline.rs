//! Fail-fast execution of a plan for `devrun run`.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::types::{Action, ExecOutcome, FailureKind, TaskReport, TaskStatus};
use crate::exit_codes;
use crate::io::executor::{ExecRequest, OutputSettings, TaskExecutor};
use crate::plan::build_plan;
use crate::tasks::TaskFile;

/// Progress notifications, in execution order.
#[derive(Debug)]
pub enum PipelineEvent<'a> {
    /// A task is about to run its action (`None` for aggregates).
    Started {
        task: &'a str,
        action: Option<&'a Action>,
    },
    /// A task finished, successfully or not.
    Finished { report: &'a TaskReport },
}

/// The task that stopped the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub kind: FailureKind,
}

/// Summary of a pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub targets: Vec<String>,
    pub plan: Vec<String>,
    /// One report per planned task, in plan order.
    pub reports: Vec<TaskReport>,
    pub failure: Option<TaskFailure>,
}

impl PipelineOutcome {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// `0` on success, otherwise derived from the failing task.
    pub fn exit_code(&self) -> i32 {
        match &self.failure {
            None => exit_codes::OK,
            Some(failure) => exit_codes::for_failure(&failure.kind),
        }
    }

    /// Names of tasks whose action ran to success, in order.
    pub fn passed(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|report| report.status == TaskStatus::Passed)
            .map(|report| report.name.as_str())
            .collect()
    }
}

/// Run `targets` (default target if empty) one task at a time.
///
/// Each task starts only after all of its prerequisites have passed. The first
/// failing action stops the run: nothing after it executes and there are no
/// retries. Remaining planned tasks that depend on the failed task, directly or
/// through other tasks, are reported `failed` with
/// [`FailureKind::PrerequisiteFailed`]; the rest are `not_run`. Task failures
/// are returned inside the outcome; `Err` is reserved for runner errors
/// (invalid task file, unknown target, executor I/O failure).
#[instrument(skip_all, fields(targets = ?targets))]
pub fn run_pipeline<E: TaskExecutor, F: FnMut(PipelineEvent<'_>)>(
    root: &Path,
    file: &TaskFile,
    targets: &[String],
    executor: &E,
    mut on_event: F,
) -> Result<PipelineOutcome> {
    let plan = build_plan(root, file, targets)?;
    let output = OutputSettings::from_settings(&file.settings, root);
    info!(steps = plan.steps.len(), "starting pipeline");

    let mut reports = Vec::with_capacity(plan.steps.len());
    let mut failure: Option<TaskFailure> = None;
    // Failed tasks plus everything planned so far that depends on one.
    let mut blocked: HashSet<&str> = HashSet::new();

    for step in &plan.steps {
        if let Some(failed) = &failure {
            let depends = &file.tasks[&step.name].depends;
            if depends.iter().any(|dep| blocked.contains(dep.as_str())) {
                blocked.insert(&step.name);
                reports.push(TaskReport::prerequisite_failed(&step.name, &failed.task));
            } else {
                reports.push(TaskReport::not_run(&step.name));
            }
            continue;
        }

        on_event(PipelineEvent::Started {
            task: &step.name,
            action: step.action.as_ref(),
        });

        let report = match &step.action {
            None => {
                debug!(task = %step.name, "aggregate satisfied");
                TaskReport {
                    name: step.name.clone(),
                    status: TaskStatus::Passed,
                    exit_code: None,
                    failure: None,
                    duration_ms: Some(0),
                }
            }
            Some(action) => {
                let request = ExecRequest {
                    task: step.name.clone(),
                    root: root.to_path_buf(),
                    action: action.clone(),
                    output: output.clone(),
                };
                let started = Instant::now();
                let outcome = executor.exec(&request)?;
                let duration_ms = started.elapsed().as_millis() as u64;
                report_for(&step.name, action, outcome, duration_ms)
            }
        };

        if let Some(kind) = &report.failure {
            info!(task = %step.name, failure = %kind, "task failed, stopping");
            blocked.insert(&step.name);
            failure = Some(TaskFailure {
                task: step.name.clone(),
                kind: kind.clone(),
            });
        }
        on_event(PipelineEvent::Finished { report: &report });
        reports.push(report);
    }

    let outcome = PipelineOutcome {
        targets: plan.targets.clone(),
        plan: plan.names(),
        reports,
        failure,
    };
    info!(success = outcome.success(), "pipeline finished");
    Ok(outcome)
}

fn report_for(name: &str, action: &Action, outcome: ExecOutcome, duration_ms: u64) -> TaskReport {
    let is_command = matches!(action, Action::Command(_));
    match outcome {
        ExecOutcome::Success => TaskReport {
            name: name.to_string(),
            status: TaskStatus::Passed,
            exit_code: is_command.then_some(0),
            failure: None,
            duration_ms: Some(duration_ms),
        },
        ExecOutcome::Failure(kind) => TaskReport {
            name: name.to_string(),
            status: TaskStatus::Failed,
            exit_code: match kind {
                FailureKind::Exit { code } => Some(code),
                _ => None,
            },
            failure: Some(kind),
            duration_ms: Some(duration_ms),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::default_task_file;
    use crate::test_support::{ScriptedExecutor, aggregate, command, task_file};

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn all_succeeds_when_every_stage_succeeds() {
        let file = default_task_file();
        let executor = ScriptedExecutor::new();

        let outcome =
            run_pipeline(Path::new("/work"), &file, &[], &executor, |_| {}).expect("run");

        assert!(outcome.success());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(
            executor.executed(),
            vec!["install", "lint/ruff", "lint/mypy", "test", "build", "docs"]
        );
        assert_eq!(outcome.reports.len(), outcome.plan.len());
    }

    #[test]
    fn first_failure_stops_the_chain() {
        let file = default_task_file();
        let executor = ScriptedExecutor::new().fail("lint/ruff", FailureKind::Exit { code: 1 });

        let outcome = run_pipeline(Path::new("/work"), &file, &targets(&["all"]), &executor, |_| {})
            .expect("run");

        assert!(!outcome.success());
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(executor.executed(), vec!["install", "lint/ruff"]);
        assert_eq!(
            outcome.failure,
            Some(TaskFailure {
                task: "lint/ruff".to_string(),
                kind: FailureKind::Exit { code: 1 },
            })
        );
        let statuses: Vec<(&str, TaskStatus)> = outcome
            .reports
            .iter()
            .map(|report| (report.name.as_str(), report.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("install", TaskStatus::Passed),
                ("lint/ruff", TaskStatus::Failed),
                ("lint/mypy", TaskStatus::NotRun),
                ("lint", TaskStatus::Failed),
                ("test", TaskStatus::NotRun),
                ("build", TaskStatus::NotRun),
                ("docs", TaskStatus::NotRun),
                ("all", TaskStatus::Failed),
            ]
        );
        let blocked = FailureKind::PrerequisiteFailed {
            task: "lint/ruff".to_string(),
        };
        assert_eq!(outcome.reports[3].failure.as_ref(), Some(&blocked));
        assert_eq!(outcome.reports[7].failure.as_ref(), Some(&blocked));
        assert_eq!(outcome.reports[7].exit_code, None);
    }

    #[test]
    fn independent_targets_after_a_failure_are_not_run() {
        let file = default_task_file();
        let executor = ScriptedExecutor::new().fail("build", FailureKind::Exit { code: 1 });

        let outcome = run_pipeline(
            Path::new("/work"),
            &file,
            &targets(&["build", "format"]),
            &executor,
            |_| {},
        )
        .expect("run");

        let statuses: Vec<(&str, TaskStatus)> = outcome
            .reports
            .iter()
            .map(|report| (report.name.as_str(), report.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("build", TaskStatus::Failed),
                ("format/ruff", TaskStatus::NotRun),
                ("format", TaskStatus::NotRun),
            ]
        );
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn check_fails_when_type_check_fails() {
        let file = default_task_file();
        let executor = ScriptedExecutor::new().fail("lint/mypy", FailureKind::Exit { code: 2 });

        let outcome =
            run_pipeline(Path::new("/work"), &file, &targets(&["check"]), &executor, |_| {})
                .expect("run");

        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(executor.executed(), vec!["lint/ruff", "lint/mypy"]);
        assert_eq!(outcome.passed(), vec!["lint/ruff"]);
    }

    #[test]
    fn events_bracket_each_executed_task() {
        let file = task_file(vec![
            ("all", aggregate(&["a", "b"])),
            ("a", command(&["true"])),
            ("b", command(&["false"])),
        ]);
        let executor = ScriptedExecutor::new().fail("b", FailureKind::Exit { code: 1 });
        let mut events = Vec::new();

        run_pipeline(Path::new("/work"), &file, &[], &executor, |event| {
            events.push(match event {
                PipelineEvent::Started { task, action } => {
                    format!("start {task} {}", action.map(ToString::to_string).unwrap_or_default())
                }
                PipelineEvent::Finished { report } => {
                    format!("finish {} {:?}", report.name, report.status)
                }
            });
        })
        .expect("run");

        assert_eq!(
            events,
            vec![
                "start a true",
                "finish a Passed",
                "start b false",
                "finish b Failed",
            ]
        );
    }

    #[test]
    fn unknown_target_is_a_runner_error_and_runs_nothing() {
        let file = default_task_file();
        let executor = ScriptedExecutor::new();
        let err = run_pipeline(
            Path::new("/work"),
            &file,
            &targets(&["deploy"]),
            &executor,
            |_| {},
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown task 'deploy'"));
        assert!(executor.executed().is_empty());
    }
}

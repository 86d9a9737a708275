//! JSON run report written after `devrun run`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::types::TaskReport;
use crate::pipeline::PipelineOutcome;

/// Serialized summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub targets: Vec<String>,
    pub plan: Vec<String>,
    pub success: bool,
    pub exit_code: i32,
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        Self {
            targets: outcome.targets.clone(),
            plan: outcome.plan.clone(),
            success: outcome.success(),
            exit_code: outcome.exit_code(),
            tasks: outcome.reports.clone(),
        }
    }
}

/// Write the report as pretty JSON with a trailing newline.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(report).context("serialize run report")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FailureKind, TaskStatus};
    use crate::pipeline::TaskFailure;

    #[test]
    fn writes_failed_run_with_unstarted_tasks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".devrun/report.json");
        let outcome = PipelineOutcome {
            targets: vec!["check".to_string()],
            plan: vec!["lint/ruff".to_string(), "test".to_string()],
            reports: vec![
                TaskReport {
                    name: "lint/ruff".to_string(),
                    status: TaskStatus::Failed,
                    exit_code: Some(1),
                    failure: Some(FailureKind::Exit { code: 1 }),
                    duration_ms: Some(12),
                },
                TaskReport::not_run("test"),
            ],
            failure: Some(TaskFailure {
                task: "lint/ruff".to_string(),
                kind: FailureKind::Exit { code: 1 },
            }),
        };

        write_report(&path, &RunReport::from_outcome(&outcome)).expect("write");

        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.ends_with('\n'));
        let json: serde_json::Value = serde_json::from_str(&raw).expect("parse");
        assert_eq!(json["success"], false);
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["tasks"][0]["failure"]["kind"], "exit");
        assert_eq!(json["tasks"][1]["status"], "not_run");
        assert_eq!(json["tasks"][1]["exit_code"], serde_json::Value::Null);
    }
}

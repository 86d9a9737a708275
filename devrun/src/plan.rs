//! Execution plans for `devrun plan` and `devrun run`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::planner::plan_targets;
use crate::core::render::ActionRenderer;
use crate::core::types::Action;
use crate::tasks::TaskFile;
use crate::validate::ensure_valid;

/// One task in execution order with its rendered action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub name: String,
    /// `None` for aggregates.
    pub action: Option<Action>,
}

/// Resolved request: the targets asked for and every step needed to reach them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub targets: Vec<String>,
    pub steps: Vec<PlannedStep>,
}

impl Plan {
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.name.clone()).collect()
    }
}

/// Validate `file`, resolve `targets` (default target if empty) and render
/// every action up front, so template errors surface before anything runs.
pub fn build_plan(root: &Path, file: &TaskFile, targets: &[String]) -> Result<Plan> {
    ensure_valid(file)?;
    let targets = if targets.is_empty() {
        vec![file.settings.default_target.clone()]
    } else {
        targets.to_vec()
    };

    let order = plan_targets(&file.tasks, &targets)?;
    let renderer = ActionRenderer::new(&file.vars, root);
    let steps = order
        .into_iter()
        .map(|name| {
            let action = renderer
                .render(&name, &file.tasks[&name])
                .with_context(|| format!("plan task '{name}'"))?;
            Ok(PlannedStep { name, action })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Plan { targets, steps })
}

/// Human-readable plan, one step per line.
pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    for (idx, step) in plan.steps.iter().enumerate() {
        match &step.action {
            Some(action) => out.push_str(&format!("{}. {}: {}\n", idx + 1, step.name, action)),
            None => out.push_str(&format!("{}. {}\n", idx + 1, step.name)),
        }
    }
    out
}

//! Semantic invariants of a task file that TOML parsing cannot express.

use std::collections::HashSet;
use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::planner::find_cycle;
use crate::tasks::TaskFile;

/// Names the templating layer provides for every task.
pub const BUILTIN_VARS: [&str; 2] = ["root", "task"];

static TASK_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_./-]*$").expect("task name regex"));

static VAR_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("var name regex"));

/// Check semantic invariants of a parsed task file:
/// - Task names match `[A-Za-z0-9][A-Za-z0-9_./-]*`
/// - Every prerequisite exists, is not the task itself, and is listed once
/// - `run` and `remove` are mutually exclusive; `run` is non-empty
/// - `remove` paths are relative and stay inside the project root
/// - Aggregates (no action) have at least one prerequisite
/// - The prerequisite graph is acyclic
/// - `settings.default_target` names a task
/// - `vars` names are identifiers and do not shadow built-ins
///
/// Returns every violation found, in task-name order.
pub fn validate_task_file(file: &TaskFile) -> Vec<String> {
    let mut errors = Vec::new();

    for (name, task) in &file.tasks {
        if !TASK_NAME_RE.is_match(name) {
            errors.push(format!("invalid task name '{name}'"));
        }

        let mut seen = HashSet::new();
        for dep in &task.depends {
            if dep == name {
                errors.push(format!("{name}: depends on itself"));
            } else if !file.tasks.contains_key(dep) {
                errors.push(format!("{name}: unknown prerequisite '{dep}'"));
            }
            if !seen.insert(dep.as_str()) {
                errors.push(format!("{name}: prerequisite '{dep}' listed twice"));
            }
        }

        if task.run.is_some() && task.remove.is_some() {
            errors.push(format!("{name}: 'run' and 'remove' are mutually exclusive"));
        }
        if let Some(argv) = &task.run
            && argv.first().is_none_or(|program| program.trim().is_empty())
        {
            errors.push(format!("{name}: 'run' must name a program"));
        }
        if let Some(paths) = &task.remove {
            if paths.is_empty() {
                errors.push(format!("{name}: 'remove' must list at least one path"));
            }
            for path in paths {
                if !is_contained_relative(path) {
                    errors.push(format!(
                        "{name}: remove path '{path}' must be relative and inside the project"
                    ));
                }
            }
        }
        if task.is_aggregate() && task.depends.is_empty() {
            errors.push(format!("{name}: task has no action and no prerequisites"));
        }
        if task.timeout_secs == Some(0) {
            errors.push(format!("{name}: timeout_secs must be > 0"));
        }
    }

    if let Some(cycle) = find_cycle(&file.tasks) {
        errors.push(format!("dependency cycle: {}", cycle.join(" -> ")));
    }

    let default_target = &file.settings.default_target;
    if !file.tasks.contains_key(default_target) {
        errors.push(format!(
            "settings.default_target '{default_target}' is not a defined task"
        ));
    }

    for var in file.vars.keys() {
        if !VAR_NAME_RE.is_match(var) {
            errors.push(format!("invalid variable name '{var}'"));
        } else if BUILTIN_VARS.contains(&var.as_str()) {
            errors.push(format!("variable '{var}' shadows a built-in"));
        }
    }

    errors
}

/// True if `path` is non-empty, relative, and never climbs above its base.
fn is_contained_relative(path: &str) -> bool {
    let path = Path::new(path);
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}

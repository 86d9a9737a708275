//! Deterministic execution planning over the prerequisite graph.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Result, anyhow, bail};

use crate::tasks::Task;

/// Resolve the execution order for `targets`.
///
/// Depth-first post-order over `depends` in declared order, targets left to
/// right. A task reached through several paths appears once, at its first
/// position. Unknown tasks and dependency cycles are errors.
pub fn plan_targets(tasks: &BTreeMap<String, Task>, targets: &[String]) -> Result<Vec<String>> {
    let mut walk = Walk::new(tasks);
    for target in targets {
        walk.visit(target)?;
    }
    Ok(walk.order)
}

/// Find the first dependency cycle, visiting tasks in name order.
///
/// Returns the cycle as a path that starts and ends with the same task, or
/// `None` if the graph is acyclic. Edges to unknown tasks are ignored.
pub fn find_cycle(tasks: &BTreeMap<String, Task>) -> Option<Vec<String>> {
    let mut walk = Walk::new(tasks);
    for name in tasks.keys() {
        if let Err(cycle) = walk.visit_known(name) {
            return Some(cycle);
        }
    }
    None
}

struct Walk<'a> {
    tasks: &'a BTreeMap<String, Task>,
    done: HashSet<&'a str>,
    stack: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Walk<'a> {
    fn new(tasks: &'a BTreeMap<String, Task>) -> Self {
        Self {
            tasks,
            done: HashSet::new(),
            stack: Vec::new(),
            order: Vec::new(),
        }
    }

    fn visit(&mut self, name: &str) -> Result<()> {
        let tasks = self.tasks;
        let (key, task) = tasks
            .get_key_value(name)
            .ok_or_else(|| match self.stack.last() {
                Some(parent) => anyhow!("unknown task '{name}' (required by '{parent}')"),
                None => anyhow!("unknown task '{name}'"),
            })?;
        if self.done.contains(key.as_str()) {
            return Ok(());
        }
        if let Some(cycle) = self.cycle_through(key) {
            bail!("dependency cycle: {}", cycle.join(" -> "));
        }
        self.stack.push(key.as_str());
        for dep in &task.depends {
            self.visit(dep)?;
        }
        self.stack.pop();
        self.finish(key);
        Ok(())
    }

    /// Like `visit`, but skips unknown tasks and reports cycles as data.
    fn visit_known(&mut self, name: &str) -> std::result::Result<(), Vec<String>> {
        let tasks = self.tasks;
        let Some((key, task)) = tasks.get_key_value(name) else {
            return Ok(());
        };
        if self.done.contains(key.as_str()) {
            return Ok(());
        }
        if let Some(cycle) = self.cycle_through(key) {
            return Err(cycle);
        }
        self.stack.push(key.as_str());
        for dep in &task.depends {
            self.visit_known(dep)?;
        }
        self.stack.pop();
        self.finish(key);
        Ok(())
    }

    fn cycle_through(&self, name: &str) -> Option<Vec<String>> {
        let start = self.stack.iter().position(|entry| *entry == name)?;
        let mut cycle: Vec<String> = self.stack[start..].iter().map(|s| s.to_string()).collect();
        cycle.push(name.to_string());
        Some(cycle)
    }

    fn finish(&mut self, key: &'a str) {
        self.done.insert(key);
        self.order.push(key.to_string());
    }
}

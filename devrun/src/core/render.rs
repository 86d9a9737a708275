//! Template expansion of task actions.
//!
//! `run` arguments, `env` values and `cwd` may reference `{{ name }}` where
//! `name` is a `[vars]` entry or one of the built-ins `root` and `task`.
//! Undefined names are errors rather than empty strings.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior};

use crate::core::types::{Action, CommandSpec};
use crate::tasks::Task;

/// Renders task actions against a fixed set of variables.
pub struct ActionRenderer {
    env: Environment<'static>,
    vars: BTreeMap<String, String>,
}

impl ActionRenderer {
    /// `root` is exposed to templates as `{{ root }}`.
    pub fn new(vars: &BTreeMap<String, String>, root: &Path) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        let mut vars = vars.clone();
        vars.insert("root".to_string(), root.display().to_string());
        Self { env, vars }
    }

    /// Render the action of task `name`; `None` for aggregates.
    pub fn render(&self, name: &str, task: &Task) -> Result<Option<Action>> {
        if let Some(paths) = &task.remove {
            return Ok(Some(Action::Remove {
                paths: paths.clone(),
            }));
        }
        let Some(argv) = &task.run else {
            return Ok(None);
        };
        let mut ctx = self.vars.clone();
        ctx.insert("task".to_string(), name.to_string());

        let argv = argv
            .iter()
            .map(|arg| self.render_str(arg, &ctx))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("render run for task '{name}'"))?;
        let cwd = task
            .cwd
            .as_deref()
            .map(|cwd| self.render_str(cwd, &ctx))
            .transpose()
            .with_context(|| format!("render cwd for task '{name}'"))?;
        let mut env = BTreeMap::new();
        for (key, value) in &task.env {
            let value = self
                .render_str(value, &ctx)
                .with_context(|| format!("render env {key} for task '{name}'"))?;
            env.insert(key.clone(), value);
        }

        Ok(Some(Action::Command(CommandSpec {
            argv,
            cwd,
            env,
            timeout: task.timeout_secs.map(Duration::from_secs),
        })))
    }

    fn render_str(&self, template: &str, ctx: &BTreeMap<String, String>) -> Result<String> {
        if !template.contains("{{") && !template.contains("{%") {
            return Ok(template.to_string());
        }
        self.env
            .render_str(template, ctx)
            .with_context(|| format!("template '{template}'"))
    }
}

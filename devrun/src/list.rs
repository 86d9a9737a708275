//! Task listing for `devrun list`.

use crate::tasks::TaskFile;

/// One line per task, name-sorted: name, description, prerequisites.
pub fn render_task_list(file: &TaskFile) -> String {
    let width = file.tasks.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::new();
    for (name, task) in &file.tasks {
        let mut line = format!("{name:<width$}");
        if let Some(desc) = &task.desc {
            line.push_str("  ");
            line.push_str(desc);
        }
        if !task.depends.is_empty() {
            line.push_str(&format!("  [{}]", task.depends.join(", ")));
        }
        if name == &file.settings.default_target {
            line.push_str("  (default)");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::default_task_file;

    #[test]
    fn lists_descriptions_prerequisites_and_default() {
        let listing = render_task_list(&default_task_file());
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(
            lines[0],
            "all          Install, lint, test, build and document  [install, lint, test, build, docs]  (default)"
        );
        assert!(lines.contains(&"lint         Run style and type checks  [lint/ruff, lint/mypy]"));
        assert!(lines.contains(&"clean        Remove caches and build artifacts"));
    }
}

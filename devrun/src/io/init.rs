//! Scaffolding for `devrun init`.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::info;

use crate::io::config::write_task_file;
use crate::tasks::default_task_file;

/// Options for `init_task_file`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing task file.
    pub force: bool,
}

/// Write the built-in workflow to `path` so it can be edited.
///
/// Fails if `path` already exists unless `options.force` is set.
pub fn init_task_file(path: &Path, options: &InitOptions) -> Result<()> {
    if path.exists() && !options.force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if path.is_dir() {
        return Err(anyhow!(
            "{} exists but is a directory",
            path.display()
        ));
    }
    write_task_file(path, &default_task_file())?;
    info!(path = %path.display(), "wrote task file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::{DEFAULT_TASK_FILE, load_task_file};
    use std::fs;

    #[test]
    fn writes_builtin_workflow() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_TASK_FILE);
        init_task_file(&path, &InitOptions { force: false }).expect("init");
        assert_eq!(load_task_file(&path).expect("load"), default_task_file());
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_TASK_FILE);
        fs::write(&path, "# mine\n").expect("write");

        let err = init_task_file(&path, &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "# mine\n");

        init_task_file(&path, &InitOptions { force: true }).expect("force init");
        assert_eq!(load_task_file(&path).expect("load"), default_task_file());
    }
}

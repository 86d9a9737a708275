//! Task file discovery, loading and writing (`devrun.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::tasks::{Settings, TaskFile, default_task_file};

/// File name looked up in the working directory when `--file` is not given.
pub const DEFAULT_TASK_FILE: &str = "devrun.toml";

/// A task file together with the project root its paths are relative to.
#[derive(Debug, Clone)]
pub struct LoadedTaskFile {
    /// Directory commands run in and `remove`/`log_dir` paths resolve against.
    pub root: PathBuf,
    /// Source file, or `None` when the built-in workflow is in use.
    pub path: Option<PathBuf>,
    pub file: TaskFile,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.default_target.trim().is_empty() {
            return Err(anyhow!("settings.default_target must be non-empty"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("settings.output_limit_bytes must be > 0"));
        }
        if self.log_dir.trim().is_empty() {
            return Err(anyhow!("settings.log_dir must be non-empty"));
        }
        if self
            .report_path
            .as_deref()
            .is_some_and(|path| path.trim().is_empty())
        {
            return Err(anyhow!("settings.report_path must be non-empty when set"));
        }
        Ok(())
    }
}

/// Locate and load the task file.
///
/// An explicit path must exist; its parent directory becomes the project
/// root. Without one, `devrun.toml` in `cwd` is used if present, otherwise the
/// built-in workflow with `cwd` as root.
pub fn resolve_task_file(explicit: Option<&Path>, cwd: &Path) -> Result<LoadedTaskFile> {
    let path = match explicit {
        Some(path) => {
            let path = cwd.join(path);
            if !path.is_file() {
                return Err(anyhow!("task file {} not found", path.display()));
            }
            path
        }
        None => {
            let path = cwd.join(DEFAULT_TASK_FILE);
            if !path.exists() {
                debug!(cwd = %cwd.display(), "no task file, using built-in workflow");
                let file = default_task_file();
                file.settings.validate()?;
                return Ok(LoadedTaskFile {
                    root: cwd.to_path_buf(),
                    path: None,
                    file,
                });
            }
            path
        }
    };

    let file = load_task_file(&path)?;
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.to_path_buf());
    debug!(path = %path.display(), tasks = file.tasks.len(), "loaded task file");
    Ok(LoadedTaskFile {
        root,
        path: Some(path),
        file,
    })
}

/// Load and parse a task file. Settings are validated; task invariants are not.
pub fn load_task_file(path: &Path) -> Result<TaskFile> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file: TaskFile =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    file.settings
        .validate()
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    Ok(file)
}

/// Atomically write a task file to disk (temp file + rename).
pub fn write_task_file(path: &Path, file: &TaskFile) -> Result<()> {
    file.settings.validate()?;
    let mut buf = toml::to_string_pretty(file).context("serialize task file")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("task file path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp task file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::OutputMode;

    #[test]
    fn missing_default_file_uses_builtin_workflow() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = resolve_task_file(None, temp.path()).expect("resolve");
        assert_eq!(loaded.path, None);
        assert_eq!(loaded.root, temp.path());
        assert_eq!(loaded.file, default_task_file());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = resolve_task_file(Some(Path::new("nope.toml")), temp.path()).unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[test]
    fn explicit_file_root_is_its_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("project");
        fs::create_dir(&dir).expect("mkdir");
        fs::write(
            dir.join("tasks.toml"),
            "[settings]\ndefault_target = \"test\"\noutput = \"capture\"\n\n[tasks.test]\nrun = [\"pytest\"]\n",
        )
        .expect("write");

        let loaded =
            resolve_task_file(Some(Path::new("project/tasks.toml")), temp.path()).expect("resolve");
        assert_eq!(loaded.root, dir);
        assert_eq!(loaded.file.settings.default_target, "test");
        assert_eq!(loaded.file.settings.output, OutputMode::Capture);
        assert_eq!(loaded.file.settings.log_dir, ".devrun/logs");
    }

    #[test]
    fn rejects_invalid_settings() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_TASK_FILE);
        fs::write(&path, "[settings]\noutput_limit_bytes = 0\n").expect("write");
        let err = load_task_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("output_limit_bytes must be > 0"), "{err:#}");
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(DEFAULT_TASK_FILE);
        let file = default_task_file();
        write_task_file(&path, &file).expect("write");
        let loaded = load_task_file(&path).expect("load");
        assert_eq!(loaded, file);
        assert!(!path.with_extension("toml.tmp").exists());
    }
}

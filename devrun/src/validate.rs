//! Task file validation for `devrun validate` and every other command.

use anyhow::{Result, bail};

use crate::core::invariants::validate_task_file;
use crate::tasks::TaskFile;

/// Fail with every invariant violation if the task file is not runnable.
pub fn ensure_valid(file: &TaskFile) -> Result<()> {
    let errors = validate_task_file(file);
    if !errors.is_empty() {
        bail!("invalid task file:\n- {}", errors.join("\n- "));
    }
    Ok(())
}

//! Idempotent removal of caches and build outputs.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Remove each of `paths` (relative to `root`) if present.
///
/// Files, symlinks and directory trees are all removed; missing paths are
/// skipped. Returns the paths that actually existed.
pub fn remove_paths(root: &Path, paths: &[String]) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for path in paths {
        let full = root.join(path);
        if remove_path(&full)? {
            removed.push(full);
        }
    }
    Ok(removed)
}

/// Remove a single path with `rm -rf` semantics. Returns false if it was absent.
pub fn remove_path(path: &Path) -> Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "already absent");
            return Ok(false);
        }
        Err(err) => return Err(err).with_context(|| format!("stat {}", path.display())),
    };

    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

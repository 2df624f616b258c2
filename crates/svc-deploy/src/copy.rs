//! Copy an application file set from a source tree into an install dir.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DeployError, Result};

/// Python bytecode caches never get installed.
fn skipped(name: &str) -> bool {
    name == "__pycache__" || name.ends_with(".pyc")
}

/// Copy each relative `entry` from `src_root` to the same relative path under
/// `dst_root`. Returns the copied file paths, relative to `dst_root`, sorted.
pub fn copy_file_set(src_root: &Path, dst_root: &Path, entries: &[String]) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    for entry in entries {
        let src = src_root.join(entry);
        if !src.exists() {
            return Err(DeployError::MissingSource {
                root: src_root.to_path_buf(),
                entry: entry.clone(),
            });
        }
        copy_path(&src, &dst_root.join(entry), Path::new(entry), &mut copied)?;
    }
    copied.sort();
    Ok(copied)
}

fn copy_path(src: &Path, dst: &Path, rel: &Path, copied: &mut Vec<PathBuf>) -> Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dst).map_err(DeployError::io("create", dst))?;
        let mut children: Vec<_> = fs::read_dir(src)
            .map_err(DeployError::io("read", src))?
            .filter_map(|e| e.ok())
            .collect();
        children.sort_by_key(|e| e.file_name());
        for child in children {
            let name = child.file_name();
            if skipped(&name.to_string_lossy()) {
                continue;
            }
            copy_path(&child.path(), &dst.join(&name), &rel.join(&name), copied)?;
        }
        return Ok(());
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(DeployError::io("create", parent))?;
    }
    fs::copy(src, dst).map_err(DeployError::io("copy", src))?;
    debug!(from = %src.display(), to = %dst.display(), "copied");
    copied.push(rel.to_path_buf());
    Ok(())
}

//! Directory copy/replace helpers shared by the installer and backups.

use std::path::Path;

use tracing::warn;

use crate::error::Result;

/// Recursively copy `src` into `dest`, duplicating file contents.
///
/// Symlinks to files are copied as regular files; symlinks to directories
/// and dangling links are skipped.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;

    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if file_type.is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => {},
                _ => {
                    warn!(path = %entry.path().display(), "skipping symlink that is not a file");
                    continue;
                },
            }
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(entry.path(), &target)?;
    }

    Ok(())
}

/// Remove whatever is at `path` (directory tree, file, or link). Missing is fine.
pub fn remove_path(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Replace `dest` with a full copy of `src`.
pub fn replace_dir(src: &Path, dest: &Path) -> Result<()> {
    remove_path(dest)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    copy_dir_recursive(src, dest)
}

/// Whether anything (including a dangling link) exists at `path`.
pub fn path_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

//! File copying for the package layout.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PackageError, Result};

/// Copy every file with extension `ext` below `src` into `dst`, keeping
/// the relative directory structure.
///
/// Symlinks are followed, so the package holds real files. Returns the
/// copied paths relative to `dst`, sorted.
pub fn copy_matching_recursive(src: &Path, dst: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    copy_matching_inner(src, dst, ext, Path::new(""), &mut copied)?;
    copied.sort();
    Ok(copied)
}

fn copy_matching_inner(
    src: &Path,
    dst: &Path,
    ext: &str,
    relative: &Path,
    copied: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries =
        fs::read_dir(src).map_err(|e| PackageError::io("Failed to read directory", src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| PackageError::io("Failed to read directory", src, e))?;
        let path = entry.path();
        let rel = relative.join(entry.file_name());

        if path.is_dir() {
            copy_matching_inner(&path, dst, ext, &rel, copied)?;
        } else if path.extension().is_some_and(|e| e == ext) {
            let dest_path = dst.join(&rel);
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| PackageError::io("Failed to create directory", parent, e))?;
            }
            fs::copy(&path, &dest_path)
                .map_err(|e| PackageError::io("Failed to copy file", &path, e))?;
            copied.push(rel);
        }
    }

    Ok(())
}

/// Copy a single file into `dest_dir` under `name`.
///
/// A missing source is reported as [`PackageError::MissingFile`].
pub fn copy_file_into(src: &Path, dest_dir: &Path, name: &str) -> Result<PathBuf> {
    if !src.is_file() {
        return Err(PackageError::MissingFile {
            path: src.to_path_buf(),
        });
    }
    fs::create_dir_all(dest_dir)
        .map_err(|e| PackageError::io("Failed to create directory", dest_dir, e))?;
    let dest = dest_dir.join(name);
    fs::copy(src, &dest).map_err(|e| PackageError::io("Failed to copy file", src, e))?;
    Ok(dest)
}

//! Filesystem utilities for artifact building.
//!
//! Copying resource files into an extracted image, and moving finished
//! artifacts into place.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Top-level entries of `dir`, sorted by file name.
///
/// Hidden entries are included. Fails if `dir` cannot be read.
pub fn top_level_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        entries.push(entry.into_path());
    }
    Ok(entries)
}

/// Copy a file, symlink, or directory tree into `dst_dir`, keeping its name.
pub fn copy_entry(src: &Path, dst_dir: &Path) -> Result<()> {
    let name = src
        .file_name()
        .with_context(|| format!("Cannot copy path without a name: {}", src.display()))?;
    let dst = dst_dir.join(name);
    let file_type = fs::symlink_metadata(src)
        .with_context(|| format!("Failed to stat {}", src.display()))?
        .file_type();

    if file_type.is_symlink() {
        copy_symlink(src, &dst)
    } else if file_type.is_dir() {
        copy_dir_recursive(src, &dst)
    } else {
        fs::copy(src, &dst)
            .with_context(|| format!("Failed to copy file: {}", src.display()))?;
        Ok(())
    }
}

/// Recursively copy a directory, preserving symlinks.
///
/// `dst` is created if it doesn't exist. File permissions are kept, so
/// executable scripts stay executable inside the image.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)
            .with_context(|| format!("Failed to create directory: {}", dst.display()))?;
    }

    for entry in fs::read_dir(src)
        .with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)
                .with_context(|| format!("Failed to copy file: {}", src_path.display()))?;
        }
    }

    Ok(())
}

fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src)?;
    if dst.exists() || dst.is_symlink() {
        fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("Failed to create symlink: {}", dst.display()))
}

/// Atomically move a file by renaming, with fallback to copy+delete.
pub fn atomic_move(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            // Different filesystem, fall back to copy+delete
            fs::copy(src, dst)
                .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
            fs::remove_file(src)
                .with_context(|| format!("Failed to remove {}", src.display()))?;
            Ok(())
        }
    }
}

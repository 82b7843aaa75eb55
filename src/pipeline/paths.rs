use anyhow::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `base` unless it is already absolute.
pub(crate) fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Make `path` absolute relative to the current directory.
///
/// The path does not have to exist yet.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("resolving current directory")?;
    Ok(resolve_against(&cwd, path))
}

/// Directory a file path lives in; `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Reject `path` unless it stays inside whatever root it is joined to.
///
/// Only plain names and `.` are allowed; root, prefix and `..` components
/// are not. `what` names the setting in the error.
pub(crate) fn ensure_contained(path: &Path, what: &str) -> Result<()> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.as_os_str().is_empty() || escapes {
        bail!("{} must be a relative path without '..': '{}'", what, path.display());
    }
    Ok(())
}

//! Compressed cpio archives (initram images).
//!
//! Unpacking and packing are both `gzip` + `cpio` chains run with the
//! archive directory as the chain's working directory.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::artifact::filesystem::atomic_move;
use crate::process::{Cmd, Pipeline};

/// Default gzip level used when packing.
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// Extract a gzip-compressed cpio archive into `contents`.
///
/// `contents` is created if missing. Existing files in it are overwritten
/// only where cpio would overwrite them.
pub fn unpack_initram(archive: &Path, contents: &Path) -> Result<()> {
    if !archive.is_file() {
        bail!("initram archive does not exist: {}", archive.display());
    }
    fs::create_dir_all(contents)
        .with_context(|| format!("creating unpack directory '{}'", contents.display()))?;

    info!(archive = %archive.display(), into = %contents.display(), "unpacking initram");

    Pipeline::new()
        .dir(contents)
        .stdin_file(archive)
        .then(Cmd::new("gzip").args(["-d", "--to-stdout"]))
        .then(Cmd::new("cpio").args(["-i", "--make-directories", "--quiet"]))
        .error_msg(format!("unpacking '{}'", archive.display()))
        .run()
}

/// Build a gzip-compressed newc cpio archive from a directory.
///
/// Every entry under `root`, including `root` itself (as `.`), is archived.
/// The archive is assembled in a hidden partial file next to `output` and
/// moved into place only once every process in the chain succeeded.
///
/// # Example
///
/// ```rust,ignore
/// use coreos_customizer::artifact::cpio::pack_initram;
/// use std::path::Path;
///
/// pack_initram(
///     Path::new("/tmp/initram-contents"),
///     Path::new("out/custom.cpio.gz"),
///     6,
/// )?;
/// ```
pub fn pack_initram(root: &Path, output: &Path, gzip_level: u32) -> Result<()> {
    if !root.is_dir() {
        bail!("initram contents directory does not exist: {}", root.display());
    }
    if !(1..=9).contains(&gzip_level) {
        bail!("gzip level must be between 1 and 9, got {}", gzip_level);
    }

    let partial = partial_path(output)?;
    if let Some(parent) = partial.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }

    info!(contents = %root.display(), output = %output.display(), "packing initram");

    // newc is the only cpio format the kernel accepts for initramfs
    let packed = Pipeline::new()
        .dir(root)
        .then(Cmd::new("find").args([".", "-print0"]))
        .then(Cmd::new("cpio").args(["--null", "-o", "-H", "newc", "--quiet"]))
        .then(Cmd::new("gzip").arg(format!("-{}", gzip_level)))
        .stdout_file(&partial)
        .error_msg(format!("packing '{}'", root.display()))
        .run();

    if let Err(err) = packed {
        let _ = fs::remove_file(&partial);
        return Err(err);
    }

    atomic_move(&partial, output)
}

/// List the entry names of a compressed cpio archive without extracting it.
pub fn list_initram(archive: &Path) -> Result<Vec<String>> {
    let listing = tempfile::NamedTempFile::new().context("creating listing file")?;

    Pipeline::new()
        .stdin_file(archive)
        .then(Cmd::new("gzip").args(["-d", "--to-stdout"]))
        .then(Cmd::new("cpio").args(["-t", "--quiet"]))
        .stdout_file(listing.path())
        .error_msg(format!("listing '{}'", archive.display()))
        .run()?;

    let text = fs::read_to_string(listing.path())
        .with_context(|| format!("reading listing of '{}'", archive.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

fn partial_path(output: &Path) -> Result<PathBuf> {
    let name = output
        .file_name()
        .with_context(|| format!("output path has no file name: {}", output.display()))?;
    let mut partial = std::ffi::OsString::from(".");
    partial.push(name);
    partial.push(".partial");
    Ok(output.with_file_name(partial))
}

//! Squashfs image rebuilding.
//!
//! The image is extracted with `unsquashfs`, the resource files are copied
//! in, and `mksquashfs` writes a replacement image over the original.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::artifact::filesystem::{copy_entry, top_level_entries};
use crate::pipeline::paths::ensure_contained;
use crate::process::Cmd;

/// Name of the scratch directory the image is extracted into.
///
/// This is also the root prefix `unsquashfs -l` prints for every entry.
pub const SCRATCH_DIR: &str = "squashfs-root";

/// Options for extracting and rebuilding a squashfs image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SquashfsOptions {
    /// Whether to carry extended attributes through the rebuild.
    ///
    /// Default: false. Xattrs fail to extract inside most containers and
    /// the initram does not need them.
    pub xattrs: bool,

    /// Compression algorithm passed to `mksquashfs -comp`.
    ///
    /// Default: `None`, which keeps mksquashfs' own default (gzip).
    pub compression: Option<String>,
}

/// Inject the top-level entries of `from_dir` into `to_dir` inside `image`.
///
/// `to_dir` is relative to the image root and is created when absent. The
/// scratch directory is `squashfs-root` next to the image and is removed
/// once the replacement image has been written.
///
/// Fails before touching the image when `from_dir` has no entries.
///
/// # Example
///
/// ```rust,ignore
/// use coreos_customizer::artifact::squashfs::{rebuild_squashfs, SquashfsOptions};
/// use std::path::Path;
///
/// rebuild_squashfs(
///     Path::new("/tmp/initram-contents/usr.squashfs"),
///     Path::new("resources/"),
///     Path::new("share/oem"),
///     &SquashfsOptions::default(),
/// )?;
/// ```
pub fn rebuild_squashfs(
    image: &Path,
    from_dir: &Path,
    to_dir: &Path,
    options: &SquashfsOptions,
) -> Result<()> {
    let entries = top_level_entries(from_dir)?;
    if entries.is_empty() {
        bail!("no files to add found in {}", from_dir.display());
    }
    ensure_contained(to_dir, "target directory")?;
    if !image.is_file() {
        bail!("squashfs image does not exist: {}", image.display());
    }

    let scratch = scratch_dir_for(image);
    if scratch.exists() {
        bail!(
            "scratch directory already exists, refusing to extract over it: {}",
            scratch.display()
        );
    }

    info!(
        image = %image.display(),
        files = entries.len(),
        target = %to_dir.display(),
        "rebuilding squashfs"
    );

    let mut unsquash = Cmd::new("unsquashfs").arg("-no-progress");
    if !options.xattrs {
        unsquash = unsquash.arg("-no-xattrs");
    }
    unsquash
        .arg("-d")
        .arg_path(&scratch)
        .arg_path(image)
        .error_msg(format!("extracting '{}'", image.display()))
        .run()?;

    let target = scratch.join(to_dir);
    fs::create_dir_all(&target)
        .with_context(|| format!("creating '{}' inside the image", to_dir.display()))?;

    for entry in &entries {
        copy_entry(entry, &target)?;
    }

    // Argument order is SOURCE OUTPUT (the opposite of mkfs.erofs).
    let mut mksquash = Cmd::new("mksquashfs")
        .arg_path(&scratch)
        .arg_path(image)
        .args(["-noappend", "-always-use-fragments", "-no-progress"]);
    if !options.xattrs {
        mksquash = mksquash.arg("-no-xattrs");
    }
    if let Some(compression) = &options.compression {
        mksquash = mksquash.args(["-comp", compression.as_str()]);
    }
    mksquash
        .error_msg(format!("reassembling '{}'", image.display()))
        .run()?;

    fs::remove_dir_all(&scratch)
        .with_context(|| format!("removing scratch directory '{}'", scratch.display()))?;

    Ok(())
}

/// Entries of a squashfs image as printed by `unsquashfs -l`.
///
/// Every entry is rooted at `squashfs-root`, and the root itself is the
/// first entry. Entries come out in image order.
pub fn list_squashfs(image: &Path) -> Result<Vec<String>> {
    let result = Cmd::new("unsquashfs")
        .arg("-l")
        .arg_path(image)
        .error_msg(format!("listing '{}'", image.display()))
        .run()?;

    Ok(result
        .stdout
        .lines()
        .filter(|line| *line == SCRATCH_DIR || line.starts_with(&format!("{}/", SCRATCH_DIR)))
        .map(str::to_string)
        .collect())
}

/// Build a fresh squashfs image from a directory.
pub fn build_squashfs(source_dir: &Path, output: &Path, options: &SquashfsOptions) -> Result<()> {
    if !source_dir.is_dir() {
        bail!("Source directory does not exist: {}", source_dir.display());
    }
    let mut mksquash = Cmd::new("mksquashfs")
        .arg_path(source_dir)
        .arg_path(output)
        .args(["-noappend", "-no-progress"]);
    if !options.xattrs {
        mksquash = mksquash.arg("-no-xattrs");
    }
    if let Some(compression) = &options.compression {
        mksquash = mksquash.args(["-comp", compression.as_str()]);
    }
    mksquash
        .error_msg(format!("building '{}'", output.display()))
        .run()?;
    Ok(())
}

fn scratch_dir_for(image: &Path) -> PathBuf {
    match image.parent() {
        Some(parent) => parent.join(SCRATCH_DIR),
        None => PathBuf::from(SCRATCH_DIR),
    }
}

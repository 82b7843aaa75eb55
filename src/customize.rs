//! The customization pipeline.
//!
//! Download kernel → download initram → unpack initram → inject resources
//! into the embedded squashfs → repack initram → remove the working
//! directory. The downloaded kernel and original initram are kept next to
//! the output; everything else lives in a private temporary directory.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::artifact::cpio::{pack_initram, unpack_initram};
use crate::artifact::fetch::{download, local_path_for};
use crate::artifact::squashfs::rebuild_squashfs;
use crate::pipeline::config::CustomizeConfig;
use crate::pipeline::paths::parent_dir;
use crate::pipeline::{FailureKind, Script};
use crate::preflight::check_host_tools;

/// Prefix of the per-run temporary directory.
pub const WORKDIR_PREFIX: &str = "initram-contents";

/// Paths produced by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomizeReport {
    /// Downloaded kernel, next to the output.
    pub vmlinuz: PathBuf,
    /// Downloaded, unmodified initram, next to the output.
    pub original_initram: PathBuf,
    /// The customized initram.
    pub custom: PathBuf,
    pub custom_size: u64,
}

/// Run the whole pipeline for `config`.
///
/// The first failing step aborts the run. The temporary working directory is
/// removed on both the success and the failure path.
pub fn build_custom_image(config: &CustomizeConfig) -> Result<CustomizeReport> {
    if config.preflight {
        check_host_tools().context("preflight check failed")?;
    }
    if !config.resources.is_dir() {
        bail!(
            "resources directory does not exist: {}",
            config.resources.display()
        );
    }

    let outdir = parent_dir(&config.custom);
    let orig_vmlinuz = local_path_for(&outdir, &config.vmlinuz)?;
    let orig_initram = local_path_for(&outdir, &config.initram)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(WORKDIR_PREFIX);
    let workdir = match &config.work_root {
        Some(root) => {
            fs::create_dir_all(root)
                .with_context(|| format!("creating work root '{}'", root.display()))?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
    .context("creating temporary working directory")?;
    let contents = workdir.path().to_path_buf();
    let image = contents.join(&config.squashfs_image);

    info!(
        workdir = %contents.display(),
        output = %config.custom.display(),
        "building custom image"
    );

    let result = Script::new("BuildCustomImage")
        .step("DownloadVmlinuz", FailureKind::Transfer, || {
            download(&orig_vmlinuz, &config.vmlinuz)
        })
        .step("DownloadInitram", FailureKind::Transfer, || {
            download(&orig_initram, &config.initram)
        })
        .step("UnpackInitram", FailureKind::Extraction, || {
            unpack_initram(&orig_initram, &contents)
        })
        .step("RebuildSquashFS", FailureKind::Assembly, || {
            rebuild_squashfs(&image, &config.resources, &config.oem_dir, &config.squashfs)
        })
        .step("PackInitram", FailureKind::Assembly, || {
            pack_initram(&contents, &config.custom, config.gzip_level)
        })
        .step("RemoveWorkdir", FailureKind::Cleanup, move || {
            let path = workdir.path().to_path_buf();
            workdir
                .close()
                .with_context(|| format!("removing working directory '{}'", path.display()))
        })
        .run();

    if let Err(err) = result {
        // Unrun steps were dropped, and the working directory with them.
        if contents.exists() {
            warn!(workdir = %contents.display(), "working directory left behind");
        }
        return Err(err.into());
    }

    let custom_size = fs::metadata(&config.custom)
        .with_context(|| format!("reading output '{}'", config.custom.display()))?
        .len();
    if custom_size == 0 {
        bail!("output is empty: {}", config.custom.display());
    }

    Ok(CustomizeReport {
        vmlinuz: orig_vmlinuz,
        original_initram: orig_initram,
        custom: config.custom.clone(),
        custom_size,
    })
}

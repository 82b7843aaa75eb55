use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::cpio::DEFAULT_GZIP_LEVEL;
use crate::artifact::squashfs::SquashfsOptions;
use crate::pipeline::paths::{absolutize, ensure_contained, parent_dir, resolve_against};

/// Embedded image path, relative to the unpacked initram root.
pub const DEFAULT_SQUASHFS_IMAGE: &str = "usr.squashfs";
/// Where resource files land, relative to the embedded image root.
pub const DEFAULT_OEM_DIR: &str = "share/oem";

/// Fully resolved settings for one customization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomizeConfig {
    /// URL of the kernel image.
    pub vmlinuz: String,
    /// URL of the gzip-compressed initram archive.
    pub initram: String,
    /// Directory whose top-level entries are added to the image.
    pub resources: PathBuf,
    /// Output path of the customized initram.
    pub custom: PathBuf,
    pub squashfs_image: PathBuf,
    pub oem_dir: PathBuf,
    pub gzip_level: u32,
    pub squashfs: SquashfsOptions,
    /// Directory the per-run working directory is created in; the system
    /// temporary directory when `None`.
    pub work_root: Option<PathBuf>,
    /// Check host tools before running.
    pub preflight: bool,
}

/// Values supplied on the command line; `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub vmlinuz: Option<String>,
    pub initram: Option<String>,
    pub resources: Option<PathBuf>,
    pub custom: Option<PathBuf>,
    pub skip_preflight: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CustomizeToml {
    vmlinuz: Option<String>,
    initram: Option<String>,
    resources: Option<String>,
    custom: Option<String>,
    squashfs_image: Option<String>,
    oem_dir: Option<String>,
    gzip_level: Option<u32>,
    work_root: Option<String>,
    preflight: Option<bool>,
    squashfs: Option<SquashfsToml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SquashfsToml {
    xattrs: Option<bool>,
    compression: Option<String>,
}

impl CustomizeConfig {
    /// Resolve settings from an optional TOML file plus command-line values.
    ///
    /// Command-line values win. Relative paths from the file are resolved
    /// against the file's directory; relative paths from the command line
    /// against the current directory.
    pub fn resolve(config_file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let (file, file_dir) = match config_file {
            Some(path) => {
                let path = absolutize(path)?;
                (load_toml(&path)?, parent_dir(&path))
            }
            None => (CustomizeToml::default(), absolutize(Path::new("."))?),
        };

        let vmlinuz = overrides
            .vmlinuz
            .or(file.vmlinuz)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let initram = overrides
            .initram
            .or(file.initram)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let resources = match overrides.resources {
            Some(path) => Some(absolutize(&path)?),
            None => file
                .resources
                .map(|p| resolve_against(&file_dir, Path::new(p.trim()))),
        };
        let custom = match overrides.custom {
            Some(path) => Some(absolutize(&path)?),
            None => file
                .custom
                .map(|p| resolve_against(&file_dir, Path::new(p.trim()))),
        };

        let mut missing = Vec::new();
        if vmlinuz.is_none() {
            missing.push("vmlinuz");
        }
        if initram.is_none() {
            missing.push("initram");
        }
        if resources.is_none() {
            missing.push("resources");
        }
        if custom.is_none() {
            missing.push("custom");
        }
        let (Some(vmlinuz), Some(initram), Some(resources), Some(custom)) =
            (vmlinuz, initram, resources, custom)
        else {
            bail!("missing required setting(s): {}", missing.join(", "));
        };

        let squashfs_toml = file.squashfs.unwrap_or_default();
        let config = Self {
            vmlinuz,
            initram,
            resources,
            custom,
            squashfs_image: PathBuf::from(
                file.squashfs_image
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or(DEFAULT_SQUASHFS_IMAGE),
            ),
            oem_dir: PathBuf::from(
                file.oem_dir
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or(DEFAULT_OEM_DIR),
            ),
            gzip_level: file.gzip_level.unwrap_or(DEFAULT_GZIP_LEVEL),
            squashfs: SquashfsOptions {
                xattrs: squashfs_toml.xattrs.unwrap_or(false),
                compression: squashfs_toml
                    .compression
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty()),
            },
            work_root: file
                .work_root
                .map(|p| resolve_against(&file_dir, Path::new(p.trim()))),
            preflight: !overrides.skip_preflight && file.preflight.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=9).contains(&self.gzip_level) {
            bail!("gzip_level must be between 1 and 9, got {}", self.gzip_level);
        }
        ensure_contained(&self.squashfs_image, "squashfs_image")?;
        ensure_contained(&self.oem_dir, "oem_dir")?;
        Ok(())
    }
}

fn load_toml(path: &Path) -> Result<CustomizeToml> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config '{}'", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config '{}'", path.display()))
}

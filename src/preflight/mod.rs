//! Preflight checks for build validation.
//!
//! Validates that the host system has the tools the pipeline shells out to
//! before anything is downloaded. A missing `mksquashfs` should be reported
//! up front, not after two downloads and an unpack.
//!
//! # Example
//!
//! ```rust
//! use coreos_customizer::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("mksquashfs") {
//!     println!("squashfs-tools not installed");
//! }
//!
//! let tools = &[("unsquashfs", "squashfs-tools"), ("cpio", "cpio")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

use crate::process;

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    process::exists(cmd)
}

/// Host tools the customization pipeline invokes.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("curl", "curl"),
    ("gzip", "gzip"),
    ("cpio", "cpio"),
    ("find", "findutils"),
    ("unsquashfs", "squashfs-tools"),
    ("mksquashfs", "squashfs-tools"),
];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check every tool in [`REQUIRED_TOOLS`].
pub fn check_host_tools() -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)
}

//! Remote artifact download.
//!
//! Wraps `curl`. Any non-success HTTP status or interrupted transfer is an
//! error; there are no retries.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::process::Cmd;

/// Download `url` into `dest`, overwriting any existing file.
///
/// Supports every scheme curl does; in practice `http`, `https` and `file`.
///
/// # Example
///
/// ```rust,ignore
/// use coreos_customizer::artifact::fetch::download;
/// use std::path::Path;
///
/// download(
///     Path::new("out/coreos_production_pxe.vmlinuz"),
///     "https://stable.release.core-os.net/amd64-usr/current/coreos_production_pxe.vmlinuz",
/// )?;
/// ```
pub fn download(dest: &Path, url: &str) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating download directory '{}'", parent.display()))?;
    }

    info!(url, dest = %dest.display(), "downloading");

    // --fail: non-2xx responses exit 22 instead of saving the error page
    Cmd::new("curl")
        .args(["--fail", "--silent", "--show-error", "--location", "--output"])
        .arg_path(dest)
        .arg(url)
        .error_msg(format!("downloading '{}'", url))
        .run()?;

    Ok(())
}

/// Local file name for a remote artifact: the last path segment of the URL.
///
/// Query strings and fragments are ignored. `https://host/a/b.cpio.gz?x=1`
/// maps to `b.cpio.gz`.
pub fn url_basename(url: &str) -> Result<&str> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);

    // Strip the authority so a bare host is not mistaken for a file name.
    let path = match path.split_once('/') {
        Some((_, rest)) => rest,
        None => "",
    };

    match path.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name),
        _ => bail!("cannot derive a file name from URL '{}'", url),
    }
}

/// Destination for `url` inside `dir`, named after the URL's last segment.
pub fn local_path_for(dir: &Path, url: &str) -> Result<PathBuf> {
    Ok(dir.join(url_basename(url)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_basename() {
        assert_eq!(
            url_basename("https://host/example.vmlinuz").unwrap(),
            "example.vmlinuz"
        );
        assert_eq!(
            url_basename("https://host/a/b/example.cpio.gz?token=abc#frag").unwrap(),
            "example.cpio.gz"
        );
        assert_eq!(
            url_basename("file:///srv/images/initram.cpio.gz").unwrap(),
            "initram.cpio.gz"
        );
        assert_eq!(url_basename("http://host/dir/").unwrap(), "dir");
    }

    #[test]
    fn test_url_basename_rejects_bare_host() {
        assert!(url_basename("https://host").is_err());
        assert!(url_basename("https://host/").is_err());
        assert!(url_basename("").is_err());
    }

    #[test]
    fn test_local_path_for() {
        let path = local_path_for(Path::new("/out"), "https://host/x/kernel.vmlinuz").unwrap();
        assert_eq!(path, PathBuf::from("/out/kernel.vmlinuz"));
    }
}

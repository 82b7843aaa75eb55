//! Customize a CoreOS initram by injecting files into its embedded squashfs.
//!
//! The crate sequences host tools (`curl`, `gzip`, `cpio`, `unsquashfs`,
//! `mksquashfs`); it does not implement any archive or filesystem format.
//!
//! - **Artifact operations** - download, cpio unpack/pack, squashfs rebuild
//! - **Pipeline** - ordered fail-fast steps, configuration, path helpers
//! - **Preflight checks** - host tool validation before a run
//!
//! # Architecture
//!
//! ```text
//! customize-coreos (bin)
//!     │
//!     └── customize::build_custom_image
//!             │
//!             ├── preflight::check_host_tools
//!             └── pipeline::Script "BuildCustomImage"
//!                     ├── artifact::fetch::download        (vmlinuz)
//!                     ├── artifact::fetch::download        (initram)
//!                     ├── artifact::cpio::unpack_initram
//!                     ├── artifact::squashfs::rebuild_squashfs
//!                     ├── artifact::cpio::pack_initram
//!                     └── remove working directory
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use coreos_customizer::{build_custom_image, ConfigOverrides, CustomizeConfig};
//!
//! let config = CustomizeConfig::resolve(None, ConfigOverrides {
//!     vmlinuz: Some("https://host/coreos_production_pxe.vmlinuz".into()),
//!     initram: Some("https://host/coreos_production_pxe_image.cpio.gz".into()),
//!     resources: Some("addfiles".into()),
//!     custom: Some("out/custom.cpio.gz".into()),
//!     skip_preflight: false,
//! })?;
//! build_custom_image(&config)?;
//! ```

pub mod artifact;
pub mod customize;
pub mod logging;
pub mod pipeline;
pub mod preflight;
pub mod process;

pub use customize::{build_custom_image, CustomizeReport};
pub use pipeline::config::{ConfigOverrides, CustomizeConfig};
pub use pipeline::{FailureKind, Script, StepError};

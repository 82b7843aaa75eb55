//! Artifact operations for the customization pipeline.
//!
//! - [`fetch`] - Downloading kernel and initram images (curl)
//! - [`cpio`] - Unpacking and packing gzip-compressed newc archives
//! - [`squashfs`] - Injecting files into a squashfs image
//! - [`filesystem`] - Copy and move helpers shared by the above

pub mod cpio;
pub mod fetch;
pub mod filesystem;
pub mod squashfs;

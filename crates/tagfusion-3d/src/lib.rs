#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pixel-aligned depth cloud module.
pub mod pointcloud;

/// Robust plane fitting module.
pub mod plane;

#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! A bundle is a rigid group of fiducial markers with one designated
//! master marker. Each frame, the orchestrator fuses the markers that
//! happen to be visible (each possibly only partially, each noisy) into a
//! single smoothed pose per bundle:
//!
//! 1. markers detected in the image are lifted to 3D through the
//!    depth-aligned point cloud and refined against a fitted plane,
//! 2. when a bundle's master marker is hidden, its corners are inferred
//!    from the visible members and refined the same way,
//! 3. the resulting pose runs through a per-bundle temporal smoother that
//!    picks an approximate geometric median over recent history.

/// Error types for pose fusion.
pub mod errors;

/// Bundle definitions and the bundle-file loader.
pub mod bundle;

/// Per-frame detector output and 3D marker observations.
pub mod observation;

/// Coordinate-transform collaborator interface.
pub mod transform;

/// Master-corner inference from visible member markers.
pub mod infer;

/// Rigid pose type.
pub mod pose;

/// Plane-based pose refinement.
pub mod refine;

/// Temporal pose smoothing.
pub mod smoother;

/// Per-frame fusion driver.
pub mod orchestrator;

pub use bundle::{load_bundles, Bundle, BundleRegistry, MarkerLayout};
pub use errors::FusionError;
pub use observation::{Detection, MarkerObservation};
pub use orchestrator::{FrameOutput, FusionConfig, PoseFusionOrchestrator, PoseSink};
pub use pose::Pose;
pub use refine::{refine_pose, RefineConfig};
pub use smoother::PoseHistory;
pub use transform::{TransformError, TransformLookup};

use tagfusion_3d::plane::PlaneFitError;

use crate::bundle::ConfigError;
use crate::transform::TransformError;

/// Errors raised while fusing a single marker or bundle.
///
/// All of these are local to the marker or bundle of the current frame;
/// the orchestrator skips the affected entity and keeps processing.
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    /// No member of the bundle was observed this frame.
    #[error("no member of the bundle was observed this frame")]
    NoObservation,

    /// A coordinate-transform lookup failed or timed out.
    #[error(transparent)]
    TransformUnavailable(#[from] TransformError),

    /// Too few candidate points to fit the support plane.
    #[error("too few points for plane fitting")]
    InsufficientPoints(#[source] PlaneFitError),

    /// No usable corner pair was left to fix the in-plane orientation.
    #[error("no usable corner pair to fix the marker orientation")]
    DegenerateGeometry,

    /// A bundle definition file could not be loaded. Fatal at startup.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<PlaneFitError> for FusionError {
    fn from(err: PlaneFitError) -> Self {
        match err {
            PlaneFitError::InsufficientPoints(_) => FusionError::InsufficientPoints(err),
            // a collinear candidate set cannot orient the marker either
            PlaneFitError::Degenerate => FusionError::DegenerateGeometry,
        }
    }
}

use std::time::Duration;

use crate::bundle::Bundle;
use crate::errors::FusionError;
use crate::observation::MarkerObservation;
use crate::transform::TransformLookup;

/// Estimate the 3D corners of a bundle's master marker from the visible
/// member markers.
///
/// For every observed non-master member, each of its static corners is
/// mapped into the member's local marker frame and transformed into the
/// cloud frame, where it lands on the diagonally opposite master corner:
/// member corner `j` estimates master corner `(j + 2) % 4`. The estimates
/// are averaged per corner over all contributing members.
///
/// The `[-y, x, z]` component swap converts the bundle file's layout axes
/// into the marker frame the transform service knows. Together with the
/// diagonal correspondence it is a fixed convention of how bundle files
/// encode marker layout; do not change one without the other.
///
/// # Arguments
///
/// * `bundle` - The bundle whose master corners are wanted.
/// * `observations` - This frame's marker observations.
/// * `transforms` - Transform lookup into the cloud frame.
/// * `geometry_unit` - Meters per bundle-geometry unit.
/// * `timeout` - Per-lookup transform timeout.
///
/// # Returns
///
/// The 4 averaged master corner estimates in the cloud frame.
pub fn infer_master_corners(
    bundle: &Bundle,
    observations: &[MarkerObservation],
    transforms: &dyn TransformLookup,
    geometry_unit: f64,
    timeout: Duration,
) -> Result<[[f64; 3]; 4], FusionError> {
    let mut sums = [[0.0f64; 3]; 4];
    let mut num_contributors = 0usize;

    for obs in observations {
        if obs.id == bundle.master_id {
            continue;
        }
        let Some(member) = bundle.member(obs.id) else {
            continue;
        };
        num_contributors += 1;

        for (j, corner) in member.corners.iter().enumerate() {
            let local = [
                -corner[1] * geometry_unit,
                corner[0] * geometry_unit,
                corner[2] * geometry_unit,
            ];
            // a single failed lookup invalidates the whole estimate
            let in_cloud = transforms.marker_to_cloud(obs.id, local, timeout)?;

            let opposite = (j + 2) % 4;
            for (sum, v) in sums[opposite].iter_mut().zip(in_cloud.iter()) {
                *sum += v;
            }
        }
    }

    if num_contributors == 0 {
        return Err(FusionError::NoObservation);
    }

    let mut corners = sums;
    for corner in corners.iter_mut() {
        for v in corner.iter_mut() {
            *v /= num_contributors as f64;
        }
    }
    Ok(corners)
}

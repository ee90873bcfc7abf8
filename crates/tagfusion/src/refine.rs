use glam::{DMat3, DQuat, DVec3};

use tagfusion_3d::plane::{fit_plane_ransac, PlaneModel, RansacPlaneParams};

use crate::errors::FusionError;
use crate::pose::Pose;

// Corner pairs spanning the marker's forward (x) and up (y) directions,
// with the alternate pair substituted when a primary corner has no depth.
const FORWARD_PAIRS: [(usize, usize); 2] = [(0, 3), (1, 2)];
const UP_PAIRS: [(usize, usize); 2] = [(1, 0), (2, 3)];

/// Parameters for plane-based pose refinement.
#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// Plane fit parameters; the 0.005 inlier threshold matches the
    /// depth noise of the sensors this was tuned for.
    pub plane: RansacPlaneParams,
    /// Meters per bundle-geometry unit (0.01 = bundle files in
    /// centimeters). The output translation is reported in geometry
    /// units.
    pub geometry_unit: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            plane: RansacPlaneParams::default(),
            geometry_unit: 0.01,
        }
    }
}

/// Refine a marker pose against the depth data.
///
/// Fits a plane to the candidate points, takes the inlier centroid as
/// position, and fixes the orientation from the corner pairs projected
/// onto that plane, so the rotation about the plane normal is pinned by
/// the observed corners instead of left arbitrary.
///
/// # Arguments
///
/// * `corners_3d` - The marker's 4 ordered corner points, NaN where
///   unknown.
/// * `candidates` - Cloud points inside the marker footprint (or the
///   inferred corners themselves for an unseen master).
/// * `config` - Refinement parameters.
///
/// # Returns
///
/// The refined pose, translation in geometry units.
pub fn refine_pose(
    corners_3d: &[[f64; 3]; 4],
    candidates: &[[f64; 3]],
    config: &RefineConfig,
) -> Result<Pose, FusionError> {
    let fit = fit_plane_ransac(candidates, &config.plane)?;

    let (f1, f2) = select_pair(corners_3d, &FORWARD_PAIRS)?;
    let (u1, u2) = select_pair(corners_3d, &UP_PAIRS)?;

    let rotation = extract_orientation(
        &fit.model,
        DVec3::from_array(corners_3d[f1]),
        DVec3::from_array(corners_3d[f2]),
        DVec3::from_array(corners_3d[u1]),
        DVec3::from_array(corners_3d[u2]),
    )?;

    Ok(Pose {
        translation: fit.centroid() / config.geometry_unit,
        rotation,
    })
}

/// Pick the first pair whose corners both have a usable 3D estimate.
fn select_pair(
    corners_3d: &[[f64; 3]; 4],
    pairs: &[(usize, usize); 2],
) -> Result<(usize, usize), FusionError> {
    let usable = |i: usize| corners_3d[i].iter().all(|v| v.is_finite());
    pairs
        .iter()
        .copied()
        .find(|&(a, b)| usable(a) && usable(b))
        .ok_or(FusionError::DegenerateGeometry)
}

/// Build the marker orientation from the fitted plane and two corner
/// pairs.
///
/// The forward direction is the first pair's difference projected onto
/// the plane; the frame is completed with the plane normal and flipped,
/// if needed, so the up pair agrees with the frame's y axis.
fn extract_orientation(
    model: &PlaneModel,
    p1: DVec3,
    p2: DVec3,
    p3: DVec3,
    p4: DVec3,
) -> Result<DQuat, FusionError> {
    let q1 = model.project(p1);
    let q2 = model.project(p2);
    let q3 = model.project(p3);
    let q4 = model.project(p4);

    // forward pair collapsed onto one point, nothing to orient by
    if (q2 - q1).length() < 1e-3 {
        return Err(FusionError::DegenerateGeometry);
    }

    let v = (q2 - q1).normalize();
    let mut n = model.normal;
    let mut w = -v.cross(n);

    // flip the frame if the up pair points against it
    let diff = q4 - q3;
    if diff.length() >= 1e-3 && w.dot(diff.normalize()) > 0.0 {
        w = -w;
        n = -n;
    }

    Ok(DQuat::from_mat3(&DMat3::from_cols(v, w, n)).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const NAN3: [f64; 3] = [f64::NAN, f64::NAN, f64::NAN];

    fn seeded_config() -> RefineConfig {
        let mut config = RefineConfig::default();
        config.plane.random_seed = Some(7);
        config
    }

    /// Square marker corners lying on the z = 1 plane.
    fn flat_corners(half: f64) -> [[f64; 3]; 4] {
        [
            [-half, -half, 1.0],
            [half, -half, 1.0],
            [half, half, 1.0],
            [-half, half, 1.0],
        ]
    }

    /// A patch of plane points around the marker.
    fn flat_candidates(n: usize) -> Vec<[f64; 3]> {
        (0..n * n)
            .map(|i| {
                [
                    (i % n) as f64 * 0.01 - 0.05,
                    (i / n) as f64 * 0.01 - 0.05,
                    1.0,
                ]
            })
            .collect()
    }

    #[test]
    fn test_translation_is_inlier_mean() {
        let candidates = flat_candidates(10);
        let pose = refine_pose(&flat_corners(0.04), &candidates, &seeded_config()).unwrap();

        let mut mean = DVec3::ZERO;
        for p in &candidates {
            mean += DVec3::from_array(*p);
        }
        mean /= candidates.len() as f64;

        // geometry unit 0.01 scales meters into centimeters
        assert_relative_eq!(pose.translation.x, mean.x * 100.0, epsilon = 1e-9);
        assert_relative_eq!(pose.translation.y, mean.y * 100.0, epsilon = 1e-9);
        assert_relative_eq!(pose.translation.z, mean.z * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orientation_from_corners() {
        let pose = refine_pose(&flat_corners(0.04), &flat_candidates(10), &seeded_config())
            .unwrap();

        // forward pair (0,3) spans +y, up pair (1,0) spans -x, so the
        // frame comes out as x->+y, y->+x, z->-z regardless of which way
        // the fitted normal pointed
        let x_axis = pose.rotation * DVec3::X;
        let z_axis = pose.rotation * DVec3::Z;
        assert_relative_eq!(x_axis.y, 1.0, epsilon = 1e-9);
        assert_relative_eq!(z_axis.z, -1.0, epsilon = 1e-9);
        assert_relative_eq!(pose.rotation.length(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_corner_pair_fallback() {
        let full = refine_pose(&flat_corners(0.04), &flat_candidates(10), &seeded_config())
            .unwrap();

        // corner 0 missing: forward falls back to (1,2), up to (2,3)
        let mut corners = flat_corners(0.04);
        corners[0] = NAN3;
        let fallback = refine_pose(&corners, &flat_candidates(10), &seeded_config()).unwrap();

        // the alternate pairs span the same directions on a square
        assert_relative_eq!(
            fallback.rotation.dot(full.rotation).abs(),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_degenerate_when_both_pairs_missing() {
        let mut corners = flat_corners(0.04);
        corners[0] = NAN3;
        corners[2] = NAN3;
        let err = refine_pose(&corners, &flat_candidates(10), &seeded_config()).unwrap_err();
        assert!(matches!(err, FusionError::DegenerateGeometry));
    }

    #[test]
    fn test_insufficient_points() {
        let candidates = [[0.0, 0.0, 1.0], [0.1, 0.0, 1.0]];
        let err = refine_pose(&flat_corners(0.04), &candidates, &seeded_config()).unwrap_err();
        assert!(matches!(err, FusionError::InsufficientPoints(_)));
    }

    #[test]
    fn test_refine_on_corners_only() {
        // Tier B passes the 4 inferred corners as the candidate set
        let corners = flat_corners(0.04);
        let pose = refine_pose(&corners, &corners, &seeded_config()).unwrap();
        assert_relative_eq!(pose.translation.z, 100.0, epsilon = 1e-9);
    }
}

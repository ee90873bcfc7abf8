use glam::DVec3;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// Errors that can occur during plane fitting.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlaneFitError {
    /// Fewer than 3 usable points were provided.
    #[error("plane fitting needs at least 3 points, got {0}")]
    InsufficientPoints(usize),

    /// Every sampled point triple was collinear.
    #[error("candidate points are collinear, no plane is defined")]
    Degenerate,
}

/// A plane in Hessian normal form `normal . p + d = 0`.
#[derive(Debug, Clone, Copy)]
pub struct PlaneModel {
    /// Unit normal of the plane.
    pub normal: DVec3,
    /// Signed offset of the plane from the origin.
    pub d: f64,
}

impl PlaneModel {
    /// Construct the plane through three points, `None` when they are
    /// (near-)collinear.
    pub fn from_points(a: DVec3, b: DVec3, c: DVec3) -> Option<Self> {
        let n = (b - a).cross(c - a);
        if n.length_squared() < 1e-12 {
            return None;
        }
        let normal = n.normalize();
        Some(Self {
            normal,
            d: -normal.dot(a),
        })
    }

    /// Orthogonal distance from a point to the plane.
    #[inline]
    pub fn distance(&self, point: &[f64; 3]) -> f64 {
        (self.normal.dot(DVec3::from_array(*point)) + self.d).abs()
    }

    /// Orthogonal projection of a point onto the plane.
    pub fn project(&self, point: DVec3) -> DVec3 {
        point - (self.normal.dot(point) + self.d) * self.normal
    }
}

/// Result of a robust plane fit: the model and its inlier subset.
#[derive(Debug, Clone)]
pub struct PlaneFit {
    /// The fitted plane.
    pub model: PlaneModel,
    /// Points within the inlier distance threshold of the plane.
    pub inliers: Vec<[f64; 3]>,
}

impl PlaneFit {
    /// Arithmetic centroid of the inlier subset.
    pub fn centroid(&self) -> DVec3 {
        let mut sum = DVec3::ZERO;
        for p in &self.inliers {
            sum += DVec3::from_array(*p);
        }
        sum / self.inliers.len() as f64
    }
}

/// Parameters for the RANSAC plane fit.
#[derive(Debug, Clone)]
pub struct RansacPlaneParams {
    /// Maximum number of random samples to draw.
    pub max_iterations: usize,
    /// Orthogonal distance below which a point counts as an inlier.
    pub distance_threshold: f64,
    /// Optional fixed seed for reproducible sampling.
    pub random_seed: Option<u64>,
}

impl Default for RansacPlaneParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            distance_threshold: 0.005,
            random_seed: None,
        }
    }
}

/// Fit a plane to a point set with RANSAC.
///
/// Draws random point triples, scores each resulting plane by its inlier
/// count under `distance_threshold`, and returns the best model together
/// with its inlier subset.
///
/// # Arguments
///
/// * `points` - Candidate points, at least 3.
/// * `params` - RANSAC parameters.
///
/// # Returns
///
/// The winning plane model and its inliers.
pub fn fit_plane_ransac(
    points: &[[f64; 3]],
    params: &RansacPlaneParams,
) -> Result<PlaneFit, PlaneFitError> {
    if points.len() < 3 {
        return Err(PlaneFitError::InsufficientPoints(points.len()));
    }

    let mut rng: StdRng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut indices: Vec<usize> = (0..points.len()).collect();
    let mut best: Option<(PlaneModel, usize)> = None;

    for _ in 0..params.max_iterations {
        indices.shuffle(&mut rng);
        let (a, b, c) = (
            DVec3::from_array(points[indices[0]]),
            DVec3::from_array(points[indices[1]]),
            DVec3::from_array(points[indices[2]]),
        );
        let Some(model) = PlaneModel::from_points(a, b, c) else {
            continue;
        };

        let num_inliers = points
            .iter()
            .filter(|p| model.distance(p) < params.distance_threshold)
            .count();

        match best {
            Some((_, best_count)) if num_inliers <= best_count => {}
            _ => best = Some((model, num_inliers)),
        }

        // every point already explained, no better model exists
        if num_inliers == points.len() {
            break;
        }
    }

    let Some((model, _)) = best else {
        return Err(PlaneFitError::Degenerate);
    };

    let inliers = points
        .iter()
        .filter(|p| model.distance(p) < params.distance_threshold)
        .copied()
        .collect();

    Ok(PlaneFit { model, inliers })
}

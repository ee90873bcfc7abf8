use tagfusion_3d::pointcloud::DepthCloud;

/// Missing-corner sentinel.
const NO_CORNER: [f64; 3] = [f64::NAN, f64::NAN, f64::NAN];

/// One marker as reported by the 2D detector collaborator.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Fiducial id of the detected marker.
    pub id: u32,
    /// The 4 ordered corner positions in image coordinates (x = column,
    /// y = row).
    pub corners: [[f64; 2]; 4],
    /// Orientation index in `0..4`: how many corner positions the
    /// detected pattern is rotated against the canonical layout.
    pub orientation: u8,
}

/// A detected marker lifted into 3D through the depth cloud.
///
/// Created fresh each frame and discarded after use.
#[derive(Debug, Clone)]
pub struct MarkerObservation {
    /// Fiducial id of the marker.
    pub id: u32,
    /// The 4 ordered corner points in the cloud frame; corners without a
    /// depth reading are NaN.
    pub corners_3d: [[f64; 3]; 4],
    /// Valid cloud points inside the marker's pixel footprint.
    pub footprint: Vec<[f64; 3]>,
}

impl MarkerObservation {
    /// Lift a 2D detection into 3D.
    ///
    /// Looks up each image corner in the depth cloud (missing depth
    /// becomes a NaN sentinel), undoes the detector's orientation index
    /// by rotating the corner array, and gathers the marker's footprint
    /// points for plane fitting.
    pub fn from_detection(detection: &Detection, cloud: &DepthCloud) -> Self {
        let mut corners_3d = [NO_CORNER; 4];
        for (corner_3d, corner_px) in corners_3d.iter_mut().zip(detection.corners.iter()) {
            if let Some(p) = lookup_pixel(cloud, corner_px) {
                *corner_3d = p;
            }
        }

        let ori = detection.orientation as usize;
        if ori < 4 {
            corners_3d.rotate_left(ori);
        } else {
            log::error!(
                "bad orientation {} for marker id {}",
                detection.orientation,
                detection.id
            );
        }

        Self {
            id: detection.id,
            corners_3d,
            footprint: cloud.sample_quad(&detection.corners),
        }
    }

    /// Check whether corner `j` has a usable 3D estimate.
    #[inline]
    pub fn corner_valid(&self, j: usize) -> bool {
        self.corners_3d[j].iter().all(|v| v.is_finite())
    }
}

/// Nearest-pixel cloud lookup for a subpixel image coordinate.
fn lookup_pixel(cloud: &DepthCloud, corner: &[f64; 2]) -> Option<[f64; 3]> {
    let col = corner[0].round();
    let row = corner[1].round();
    if col < 0.0 || row < 0.0 {
        return None;
    }
    cloud.at(row as usize, col as usize)
}

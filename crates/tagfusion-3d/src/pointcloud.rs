/// Errors that can occur when working with depth clouds.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// The number of points does not match the grid dimensions.
    #[error("expected {expected} points for a {width}x{height} cloud, got {actual}")]
    SizeMismatch {
        /// Grid width in pixels.
        width: usize,
        /// Grid height in pixels.
        height: usize,
        /// Expected number of points.
        expected: usize,
        /// Actual number of points provided.
        actual: usize,
    },
}

/// An organized point cloud aligned with the detector image.
///
/// Points are stored row-major, one per pixel of the source depth image.
/// Pixels with no depth reading carry a NaN sentinel in all three
/// components, the usual depth sensor convention.
#[derive(Debug, Clone)]
pub struct DepthCloud {
    // Grid width in pixels.
    width: usize,
    // Grid height in pixels.
    height: usize,
    // Row-major points, one per pixel.
    points: Vec<[f64; 3]>,
}

impl DepthCloud {
    /// Create a new depth cloud from a row-major point grid.
    ///
    /// # Arguments
    ///
    /// * `width` - Grid width in pixels.
    /// * `height` - Grid height in pixels.
    /// * `points` - Row-major points, one per pixel; NaN entries mark
    ///   missing depth.
    pub fn new(width: usize, height: usize, points: Vec<[f64; 3]>) -> Result<Self, CloudError> {
        if points.len() != width * height {
            return Err(CloudError::SizeMismatch {
                width,
                height,
                expected: width * height,
                actual: points.len(),
            });
        }
        Ok(Self {
            width,
            height,
            points,
        })
    }

    /// Grid width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of grid cells, including cells with no depth reading.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud has no cells at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Look up the 3D point observed at a pixel.
    ///
    /// Returns `None` when the pixel is out of bounds or carries no depth
    /// reading.
    pub fn at(&self, row: usize, col: usize) -> Option<[f64; 3]> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let p = self.points[row * self.width + col];
        if p.iter().any(|v| v.is_nan()) {
            return None;
        }
        Some(p)
    }

    /// Collect every valid point whose pixel lies inside a convex
    /// image-space quad.
    ///
    /// # Arguments
    ///
    /// * `quad` - Four ordered corners in image coordinates (x = column,
    ///   y = row), either winding.
    ///
    /// # Returns
    ///
    /// The 3D points of all in-quad pixels that carry a depth reading.
    pub fn sample_quad(&self, quad: &[[f64; 2]; 4]) -> Vec<[f64; 3]> {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for c in quad {
            min_x = min_x.min(c[0]);
            min_y = min_y.min(c[1]);
            max_x = max_x.max(c[0]);
            max_y = max_y.max(c[1]);
        }

        // clamp the bounding box to the grid
        let row_lo = min_y.floor().max(0.0) as usize;
        let col_lo = min_x.floor().max(0.0) as usize;
        let row_hi = (max_y.ceil().max(0.0) as usize).min(self.height.saturating_sub(1));
        let col_hi = (max_x.ceil().max(0.0) as usize).min(self.width.saturating_sub(1));
        if self.is_empty() || row_lo > row_hi || col_lo > col_hi {
            return Vec::new();
        }

        let mut selected = Vec::new();
        for row in row_lo..=row_hi {
            for col in col_lo..=col_hi {
                if point_in_quad(col as f64, row as f64, quad) {
                    if let Some(p) = self.at(row, col) {
                        selected.push(p);
                    }
                }
            }
        }
        selected
    }
}

/// Test whether a pixel lies inside a convex quad, either winding.
fn point_in_quad(x: f64, y: f64, quad: &[[f64; 2]; 4]) -> bool {
    let mut sign = 0.0f64;
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let cross = (b[0] - a[0]) * (y - a[1]) - (b[1] - a[1]) * (x - a[0]);
        if cross.abs() < f64::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

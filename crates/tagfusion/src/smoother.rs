use crate::pose::Pose;

/// Number of poses the smoother remembers per bundle.
const HISTORY_LEN: usize = 10;

/// Fixed-capacity pose history producing an outlier-resistant pose.
///
/// Until the circular buffer has wrapped once, every new pose passes
/// through unchanged (warm-up). Once wrapped, each update returns the
/// buffered pose with the minimum total squared component-wise distance
/// to all other buffered poses: an approximate geometric median. The
/// output is always one of the buffered poses, never an interpolation,
/// so the quaternion stays a valid unit quaternion without averaging
/// artifacts, and a single strong outlier is suppressed because it
/// maximizes total pairwise distance.
#[derive(Debug, Clone)]
pub struct PoseHistory {
    buffer: [Pose; HISTORY_LEN],
    cursor: usize,
    initialized: bool,
}

impl Default for PoseHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            buffer: [Pose::IDENTITY; HISTORY_LEN],
            cursor: 0,
            initialized: false,
        }
    }

    /// Whether the buffer has wrapped at least once.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Record a new pose and return the smoothed pose.
    pub fn filter(&mut self, new_pose: Pose) -> Pose {
        self.buffer[self.cursor] = new_pose;

        let output = if !self.initialized {
            // warm-up passthrough; initialized flips exactly when the
            // cursor completes its first wrap
            if self.cursor == HISTORY_LEN - 1 {
                self.initialized = true;
            }
            new_pose
        } else {
            let mut min_dist = f64::INFINITY;
            let mut min_ind = 0;
            for (i, candidate) in self.buffer.iter().enumerate() {
                let total_dist: f64 = self
                    .buffer
                    .iter()
                    .map(|other| candidate.component_distance_sq(other))
                    .sum();
                if total_dist < min_dist {
                    min_dist = total_dist;
                    min_ind = i;
                }
            }
            self.buffer[min_ind]
        };

        self.cursor = (self.cursor + 1) % HISTORY_LEN;
        output
    }
}

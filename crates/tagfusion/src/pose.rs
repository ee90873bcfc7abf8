use glam::{DQuat, DVec3};

/// A rigid pose: translation in bundle-geometry units plus a unit
/// quaternion orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position of the marker origin.
    pub translation: DVec3,
    /// Orientation as a unit quaternion.
    pub rotation: DQuat,
}

impl Pose {
    /// The identity pose.
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    /// Sum of squared component-wise differences over the 3 translation
    /// and 4 quaternion components, unnormalized and unweighted.
    ///
    /// This is the distance the temporal smoother ranks poses by.
    pub fn component_distance_sq(&self, other: &Pose) -> f64 {
        let dt = self.translation - other.translation;
        let dq = [
            self.rotation.w - other.rotation.w,
            self.rotation.x - other.rotation.x,
            self.rotation.y - other.rotation.y,
            self.rotation.z - other.rotation.z,
        ];
        dt.length_squared() + dq.iter().map(|v| v * v).sum::<f64>()
    }
}

use std::time::Duration;

/// Errors returned by the coordinate-transform collaborator.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// No transform is known for the marker's frame.
    #[error("no transform available for marker id {0}")]
    Unavailable(u32),

    /// The lookup did not complete within the allowed timeout.
    #[error("transform lookup for marker id {0} timed out after {1:?}")]
    Timeout(u32, Duration),
}

/// Coordinate-transform lookup collaborator.
///
/// Converts points from a member marker's local frame into the cloud
/// frame. The lookup may block, bounded by `timeout`; a failed or
/// timed-out lookup fails only the inference that issued it, never the
/// rest of the frame.
pub trait TransformLookup {
    /// Transform a point from the marker's local frame into the cloud
    /// frame.
    ///
    /// # Arguments
    ///
    /// * `marker_id` - Id of the marker whose frame the point lives in.
    /// * `point` - The point in the marker frame, in meters.
    /// * `timeout` - Upper bound on how long the lookup may block.
    fn marker_to_cloud(
        &self,
        marker_id: u32,
        point: [f64; 3],
        timeout: Duration,
    ) -> Result<[f64; 3], TransformError>;
}

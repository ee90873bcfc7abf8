use std::collections::HashMap;
use std::time::Duration;

use tagfusion_3d::pointcloud::DepthCloud;

use crate::bundle::{Bundle, BundleRegistry};
use crate::infer::infer_master_corners;
use crate::observation::{Detection, MarkerObservation};
use crate::pose::Pose;
use crate::refine::{refine_pose, RefineConfig};
use crate::smoother::PoseHistory;
use crate::transform::TransformLookup;

/// Parameters for the fusion pipeline.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Plane refinement parameters.
    pub refine: RefineConfig,
    /// Timeout per coordinate-transform lookup during corner inference.
    pub transform_timeout: Duration,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            refine: RefineConfig::default(),
            transform_timeout: Duration::from_millis(100),
        }
    }
}

/// How a bundle's pose was obtained this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// The master marker was directly observed and refined.
    Direct,
    /// The master pose was inferred from visible member markers.
    Inferred,
    /// No member of the bundle produced a usable observation.
    Unseen,
}

/// One tracked bundle together with its mutable per-frame state.
///
/// The bundle definition is immutable; the flags are recomputed from
/// scratch every frame, and only the pose history carries information
/// across frames.
#[derive(Debug)]
struct BundleState {
    bundle: Bundle,
    seen: bool,
    master_visible: bool,
    history: PoseHistory,
    last_pose: Option<Pose>,
}

impl BundleState {
    fn new(bundle: Bundle) -> Self {
        Self {
            bundle,
            seen: false,
            master_visible: false,
            history: PoseHistory::new(),
            last_pose: None,
        }
    }

    fn tier(&self) -> Tier {
        match (self.seen, self.master_visible) {
            (true, true) => Tier::Direct,
            (true, false) => Tier::Inferred,
            (false, _) => Tier::Unseen,
        }
    }
}

/// The poses produced by one frame of processing.
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    /// Smoothed pose per bundle seen this frame, keyed by master id.
    pub bundle_poses: HashMap<u32, Pose>,
    /// Raw refined poses of visible non-master markers.
    pub marker_poses: Vec<(u32, Pose)>,
}

/// Transport collaborator consuming per-frame results. Publication and
/// visualization formatting are outside the core.
pub trait PoseSink {
    /// Hand one frame's poses to the sink.
    fn publish(&mut self, output: &FrameOutput);
}

/// Per-frame fusion driver.
///
/// Owns the tracked bundles and their histories; frames are processed
/// one at a time, to completion, on the caller's thread.
pub struct PoseFusionOrchestrator {
    bundles: Vec<BundleState>,
    config: FusionConfig,
}

impl PoseFusionOrchestrator {
    /// Create an orchestrator tracking the registry's bundles.
    pub fn new(registry: BundleRegistry, config: FusionConfig) -> Self {
        let bundles = registry
            .bundles()
            .iter()
            .cloned()
            .map(BundleState::new)
            .collect();
        Self { bundles, config }
    }

    /// How the named bundle's pose was obtained in the last processed
    /// frame.
    pub fn tier(&self, master_id: u32) -> Option<Tier> {
        self.bundles
            .iter()
            .find(|s| s.bundle.master_id == master_id)
            .map(BundleState::tier)
    }

    /// The last smoothed pose reported for a bundle, if any frame has
    /// produced one.
    pub fn last_pose(&self, master_id: u32) -> Option<Pose> {
        self.bundles
            .iter()
            .find(|s| s.bundle.master_id == master_id)
            .and_then(|s| s.last_pose)
    }

    /// Process one frame to completion.
    ///
    /// Classifies every bundle's visibility tier, refines or infers its
    /// pose, and runs the result through the bundle's temporal smoother.
    /// Per-marker and per-bundle failures are logged and skipped; they
    /// never abort the frame.
    ///
    /// # Arguments
    ///
    /// * `detections` - This frame's detector output.
    /// * `cloud` - The depth cloud aligned with the detector image.
    /// * `transforms` - Transform lookup for corner inference.
    pub fn process_frame(
        &mut self,
        detections: &[Detection],
        cloud: &DepthCloud,
        transforms: &dyn TransformLookup,
    ) -> FrameOutput {
        // visibility is recomputed from scratch every frame
        for state in self.bundles.iter_mut() {
            state.seen = false;
            state.master_visible = false;
        }

        // lift detections to 3D and refine each marker on its own
        let observations: Vec<MarkerObservation> = detections
            .iter()
            .map(|d| MarkerObservation::from_detection(d, cloud))
            .collect();

        let mut refined: Vec<Option<Pose>> = Vec::with_capacity(observations.len());
        for obs in &observations {
            match refine_pose(&obs.corners_3d, &obs.footprint, &self.config.refine) {
                Ok(pose) => {
                    // only a successfully refined detection counts as a
                    // sighting of its bundle
                    for state in self.bundles.iter_mut() {
                        if state.bundle.contains(obs.id) {
                            state.seen = true;
                            if state.bundle.master_id == obs.id {
                                state.master_visible = true;
                            }
                        }
                    }
                    refined.push(Some(pose));
                }
                Err(err) => {
                    log::warn!("marker {}: refinement failed: {}", obs.id, err);
                    refined.push(None);
                }
            }
        }

        let mut output = FrameOutput::default();

        // raw poses of visible markers that are not a bundle master
        for (obs, pose) in observations.iter().zip(refined.iter()) {
            if let Some(pose) = pose {
                let is_master = self.bundles.iter().any(|s| s.bundle.master_id == obs.id);
                if !is_master {
                    output.marker_poses.push((obs.id, *pose));
                }
            }
        }

        for state in self.bundles.iter_mut() {
            if !state.seen {
                log::debug!("bundle {}: not seen this frame", state.bundle.master_id);
                continue;
            }

            let pose = if state.master_visible {
                // Tier A: trust the master's own refined pose
                observations
                    .iter()
                    .zip(refined.iter())
                    .find(|(obs, pose)| obs.id == state.bundle.master_id && pose.is_some())
                    .and_then(|(_, pose)| *pose)
            } else {
                // Tier B: estimate the master corners from the visible
                // members, then refine on those corners
                match infer_master_corners(
                    &state.bundle,
                    &observations,
                    transforms,
                    self.config.refine.geometry_unit,
                    self.config.transform_timeout,
                )
                .and_then(|corners| refine_pose(&corners, &corners, &self.config.refine))
                {
                    Ok(pose) => Some(pose),
                    Err(err) => {
                        log::warn!(
                            "bundle {}: corner inference failed: {}",
                            state.bundle.master_id,
                            err
                        );
                        None
                    }
                }
            };

            let Some(pose) = pose else {
                // a failed estimate revokes the sighting for this frame
                state.seen = false;
                continue;
            };

            let smoothed = state.history.filter(pose);
            state.last_pose = Some(smoothed);
            output.bundle_poses.insert(state.bundle.master_id, smoothed);
        }

        log::debug!(
            "frame: {} detections, {} bundle poses",
            detections.len(),
            output.bundle_poses.len()
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::MarkerLayout;
    use crate::transform::TransformError;
    use approx::assert_relative_eq;

    /// 1 mm per pixel, flat wall at z = 1 m.
    fn wall_cloud() -> DepthCloud {
        let n = 100;
        let points = (0..n * n)
            .map(|i| [(i % n) as f64 * 0.001, (i / n) as f64 * 0.001, 1.0])
            .collect();
        DepthCloud::new(n, n, points).unwrap()
    }

    fn square(cx: f64, cy: f64, half: f64) -> [[f64; 3]; 4] {
        [
            [cx - half, cy - half, 0.0],
            [cx + half, cy - half, 0.0],
            [cx + half, cy + half, 0.0],
            [cx - half, cy + half, 0.0],
        ]
    }

    /// Master 0 centered at bundle origin, member 1 offset 6 cm in x.
    fn registry() -> BundleRegistry {
        BundleRegistry::new(vec![Bundle {
            master_id: 0,
            markers: vec![
                MarkerLayout {
                    id: 0,
                    corners: square(0.0, 0.0, 2.0),
                },
                MarkerLayout {
                    id: 1,
                    corners: square(6.0, 0.0, 2.0),
                },
            ],
        }])
        .unwrap()
    }

    fn config() -> FusionConfig {
        let mut config = FusionConfig::default();
        config.refine.plane.random_seed = Some(11);
        config
    }

    /// Detection whose quad is centered at the given pixel, 40 px wide.
    fn detection(id: u32, cx: f64, cy: f64) -> Detection {
        Detection {
            id,
            corners: [
                [cx - 20.0, cy - 20.0],
                [cx + 20.0, cy - 20.0],
                [cx + 20.0, cy + 20.0],
                [cx - 20.0, cy + 20.0],
            ],
            orientation: 0,
        }
    }

    /// Rigid member-frame-to-cloud map consistent with the wall scene:
    /// a quarter-turn about z plus the member's position on the wall.
    struct WallTransforms {
        /// cloud-frame position of the bundle origin
        bundle_origin: [f64; 3],
        known: Vec<u32>,
    }

    impl TransformLookup for WallTransforms {
        fn marker_to_cloud(
            &self,
            marker_id: u32,
            point: [f64; 3],
            _timeout: Duration,
        ) -> Result<[f64; 3], TransformError> {
            if !self.known.contains(&marker_id) {
                return Err(TransformError::Unavailable(marker_id));
            }
            // member 1 sits 6 cm from the bundle origin along x
            let center = [self.bundle_origin[0] + 0.06, self.bundle_origin[1], self.bundle_origin[2]];
            Ok([
                -point[1] + center[0],
                point[0] + center[1],
                point[2] + center[2],
            ])
        }
    }

    fn wall_transforms() -> WallTransforms {
        WallTransforms {
            bundle_origin: [0.020, 0.020, 1.0],
            known: vec![1],
        }
    }

    #[test]
    fn test_tier_direct_when_master_seen() {
        let mut orchestrator = PoseFusionOrchestrator::new(registry(), config());
        let cloud = wall_cloud();
        let detections = [detection(0, 20.0, 20.0)];

        let output = orchestrator.process_frame(&detections, &cloud, &wall_transforms());
        assert_eq!(orchestrator.tier(0), Some(Tier::Direct));
        assert!(output.bundle_poses.contains_key(&0));
        assert!(output.marker_poses.is_empty());
    }

    #[test]
    fn test_tier_inferred_when_member_only() {
        let mut orchestrator = PoseFusionOrchestrator::new(registry(), config());
        let cloud = wall_cloud();
        let detections = [detection(1, 60.0, 20.0)];

        let output = orchestrator.process_frame(&detections, &cloud, &wall_transforms());
        assert_eq!(orchestrator.tier(0), Some(Tier::Inferred));
        assert!(output.bundle_poses.contains_key(&0));
        // the member's raw pose is reported alongside the bundle pose
        assert_eq!(output.marker_poses.len(), 1);
        assert_eq!(output.marker_poses[0].0, 1);
    }

    #[test]
    fn test_tier_unseen_without_detections() {
        let mut orchestrator = PoseFusionOrchestrator::new(registry(), config());
        let cloud = wall_cloud();

        let output = orchestrator.process_frame(&[], &cloud, &wall_transforms());
        assert_eq!(orchestrator.tier(0), Some(Tier::Unseen));
        assert!(output.bundle_poses.is_empty());
        assert!(orchestrator.last_pose(0).is_none());
    }

    #[test]
    fn test_tiers_follow_visibility_across_frames() {
        let mut orchestrator = PoseFusionOrchestrator::new(registry(), config());
        let cloud = wall_cloud();
        let transforms = wall_transforms();

        let frames: [(&[Detection], Tier); 4] = [
            (&[detection(0, 20.0, 20.0), detection(1, 60.0, 20.0)], Tier::Direct),
            (&[detection(1, 60.0, 20.0)], Tier::Inferred),
            (&[], Tier::Unseen),
            (&[detection(0, 20.0, 20.0)], Tier::Direct),
        ];
        for (detections, expected) in frames {
            orchestrator.process_frame(detections, &cloud, &transforms);
            assert_eq!(orchestrator.tier(0), Some(expected));
        }
    }

    #[test]
    fn test_transform_failure_revokes_seen() {
        let mut orchestrator = PoseFusionOrchestrator::new(registry(), config());
        let cloud = wall_cloud();
        // member marker is detected but its transform is unknown
        let transforms = WallTransforms {
            bundle_origin: [0.020, 0.020, 1.0],
            known: vec![],
        };

        let output = orchestrator.process_frame(&[detection(1, 60.0, 20.0)], &cloud, &transforms);
        assert_eq!(orchestrator.tier(0), Some(Tier::Unseen));
        assert!(output.bundle_poses.is_empty());
    }

    #[test]
    fn test_failed_marker_refinement_revokes_seen() {
        let mut orchestrator = PoseFusionOrchestrator::new(registry(), config());
        // no depth anywhere: every refinement runs out of points
        let n = 100;
        let cloud =
            DepthCloud::new(n, n, vec![[f64::NAN, f64::NAN, f64::NAN]; n * n]).unwrap();

        let output =
            orchestrator.process_frame(&[detection(0, 20.0, 20.0)], &cloud, &wall_transforms());
        assert_eq!(orchestrator.tier(0), Some(Tier::Unseen));
        assert!(output.bundle_poses.is_empty());
        assert!(output.marker_poses.is_empty());
    }

    #[test]
    fn test_unseen_bundle_keeps_last_pose() {
        let mut orchestrator = PoseFusionOrchestrator::new(registry(), config());
        let cloud = wall_cloud();
        let transforms = wall_transforms();

        orchestrator.process_frame(&[detection(0, 20.0, 20.0)], &cloud, &transforms);
        let held = orchestrator.last_pose(0).unwrap();

        orchestrator.process_frame(&[], &cloud, &transforms);
        let after = orchestrator.last_pose(0).unwrap();
        assert_relative_eq!(
            held.translation.x,
            after.translation.x,
            epsilon = 1e-12
        );
        assert_eq!(held, after);
    }
}

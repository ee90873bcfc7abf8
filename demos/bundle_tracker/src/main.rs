use argh::FromArgs;
use std::path::PathBuf;
use std::time::Duration;

use tagfusion::bundle::MarkerLayout;
use tagfusion::{
    load_bundles, Detection, FrameOutput, FusionConfig, PoseFusionOrchestrator, PoseSink,
    TransformError, TransformLookup,
};
use tagfusion_3d::pointcloud::DepthCloud;

#[derive(FromArgs)]
/// Track marker bundles over a simulated depth-camera sequence
struct Args {
    /// paths to bundle definition files (JSON)
    #[argh(positional)]
    bundles: Vec<PathBuf>,

    /// number of frames to simulate
    #[argh(option, short = 'n', default = "30")]
    frames: usize,
}

const CLOUD_SIZE: usize = 200;
const METERS_PER_PIXEL: f64 = 0.001;
const WALL_Z: f64 = 1.0;
const GEOMETRY_UNIT: f64 = 0.01;
const BUNDLE_ORIGIN: [f64; 3] = [0.1, 0.1, WALL_Z];

/// Flat wall facing the camera, 1 mm per pixel.
fn wall_cloud() -> DepthCloud {
    let points = (0..CLOUD_SIZE * CLOUD_SIZE)
        .map(|i| {
            [
                (i % CLOUD_SIZE) as f64 * METERS_PER_PIXEL,
                (i / CLOUD_SIZE) as f64 * METERS_PER_PIXEL,
                WALL_Z,
            ]
        })
        .collect();
    DepthCloud::new(CLOUD_SIZE, CLOUD_SIZE, points).expect("static cloud dimensions")
}

fn layout_center(layout: &MarkerLayout) -> [f64; 3] {
    let mut c = [0.0f64; 3];
    for corner in &layout.corners {
        for (acc, v) in c.iter_mut().zip(corner.iter()) {
            *acc += v / 4.0;
        }
    }
    c
}

/// Where a marker sits on the wall, cloud frame.
fn marker_position(layout: &MarkerLayout) -> [f64; 3] {
    let center = layout_center(layout);
    [
        BUNDLE_ORIGIN[0] + center[0] * GEOMETRY_UNIT,
        BUNDLE_ORIGIN[1] + center[1] * GEOMETRY_UNIT,
        BUNDLE_ORIGIN[2] + center[2] * GEOMETRY_UNIT,
    ]
}

/// Synthesize the detector output for one marker.
fn synthesize_detection(layout: &MarkerLayout) -> Detection {
    let pos = marker_position(layout);
    let (cx, cy) = (pos[0] / METERS_PER_PIXEL, pos[1] / METERS_PER_PIXEL);
    let half = (layout.corners[1][0] - layout.corners[0][0]).abs() / 2.0 * GEOMETRY_UNIT
        / METERS_PER_PIXEL;
    Detection {
        id: layout.id,
        corners: [
            [cx - half, cy - half],
            [cx + half, cy - half],
            [cx + half, cy + half],
            [cx - half, cy + half],
        ],
        orientation: 0,
    }
}

/// Transform service for the simulated scene: every marker frame is a
/// quarter-turn about z plus the marker's wall position.
struct SimulatedTransforms {
    markers: Vec<MarkerLayout>,
}

impl TransformLookup for SimulatedTransforms {
    fn marker_to_cloud(
        &self,
        marker_id: u32,
        point: [f64; 3],
        _timeout: Duration,
    ) -> Result<[f64; 3], TransformError> {
        let layout = self
            .markers
            .iter()
            .find(|m| m.id == marker_id)
            .ok_or(TransformError::Unavailable(marker_id))?;
        let pos = marker_position(layout);
        Ok([-point[1] + pos[0], point[0] + pos[1], point[2] + pos[2]])
    }
}

/// Prints each frame's poses to stdout.
struct StdoutSink;

impl PoseSink for StdoutSink {
    fn publish(&mut self, output: &FrameOutput) {
        let mut masters: Vec<_> = output.bundle_poses.iter().collect();
        masters.sort_by_key(|(id, _)| **id);
        for (id, pose) in masters {
            println!(
                "bundle {id}: t = [{:7.3} {:7.3} {:7.3}]  q = [{:6.3} {:6.3} {:6.3} {:6.3}]",
                pose.translation.x,
                pose.translation.y,
                pose.translation.z,
                pose.rotation.x,
                pose.rotation.y,
                pose.rotation.z,
                pose.rotation.w,
            );
        }
        for (id, pose) in &output.marker_poses {
            println!(
                "marker {id}: t = [{:7.3} {:7.3} {:7.3}]",
                pose.translation.x, pose.translation.y, pose.translation.z,
            );
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    if args.bundles.is_empty() {
        return Err("at least one bundle file is required".into());
    }

    // fatal if any bundle file fails to load
    let registry = load_bundles(&args.bundles)?;
    log::info!("tracking {} bundle(s)", registry.len());

    let markers: Vec<MarkerLayout> = registry
        .bundles()
        .iter()
        .flat_map(|b| b.markers.iter().cloned())
        .collect();
    let bundles = registry.bundles().to_vec();

    let mut orchestrator = PoseFusionOrchestrator::new(registry, FusionConfig::default());
    let transforms = SimulatedTransforms { markers };
    let cloud = wall_cloud();
    let mut sink = StdoutSink;

    for frame in 0..args.frames {
        // alternate visibility: master hidden every third frame, nothing
        // visible every seventh, so all three tiers get exercised
        let mut detections = Vec::new();
        for bundle in &bundles {
            if frame % 7 == 6 {
                continue;
            }
            for layout in &bundle.markers {
                if layout.id == bundle.master_id && frame % 3 == 2 {
                    continue;
                }
                detections.push(synthesize_detection(layout));
            }
        }

        println!("--- frame {frame} ({} detections)", detections.len());
        let output = orchestrator.process_frame(&detections, &cloud, &transforms);
        sink.publish(&output);
    }

    Ok(())
}

use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;

/// Errors that can occur while loading bundle definition files.
///
/// Any of these is fatal at startup: the pipeline cannot run without
/// bundle definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error reading the bundle file.
    #[error("error reading bundle file")]
    Io(#[from] std::io::Error),

    /// The bundle file is not valid JSON or misses required fields.
    #[error("malformed bundle file")]
    Json(#[from] serde_json::Error),

    /// The declared master id is not a member of the bundle.
    #[error("master id {0} is not listed among the bundle markers")]
    MasterNotInBundle(u32),

    /// The same marker id appears twice in one bundle.
    #[error("marker id {0} appears more than once in the bundle")]
    DuplicateMarker(u32),
}

/// A member marker's static geometry within its bundle.
///
/// Corner positions are expressed in the master marker's frame, in the
/// bundle file's length unit (centimeters by convention).
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerLayout {
    /// Fiducial id of the marker.
    pub id: u32,
    /// The 4 ordered corner positions in the master frame.
    pub corners: [[f64; 3]; 4],
}

/// One rigid bundle of markers, loaded once at startup and immutable
/// thereafter. Per-frame visibility state lives with the orchestrator,
/// not here.
#[derive(Debug, Clone, Deserialize)]
pub struct Bundle {
    /// Id of the master marker whose pose is the bundle's output pose.
    pub master_id: u32,
    /// Member markers, master included, with their static corner layout.
    pub markers: Vec<MarkerLayout>,
}

impl Bundle {
    /// Check whether a marker id belongs to this bundle.
    pub fn contains(&self, id: u32) -> bool {
        self.markers.iter().any(|m| m.id == id)
    }

    /// Find a member marker's layout by id.
    pub fn member(&self, id: u32) -> Option<&MarkerLayout> {
        self.markers.iter().find(|m| m.id == id)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.contains(self.master_id) {
            return Err(ConfigError::MasterNotInBundle(self.master_id));
        }
        for (i, m) in self.markers.iter().enumerate() {
            if self.markers[..i].iter().any(|other| other.id == m.id) {
                return Err(ConfigError::DuplicateMarker(m.id));
            }
        }
        Ok(())
    }
}

/// The immutable set of bundles the pipeline tracks.
#[derive(Debug, Clone)]
pub struct BundleRegistry {
    bundles: Vec<Bundle>,
}

impl BundleRegistry {
    /// Build a registry from already-parsed bundles, validating each.
    pub fn new(bundles: Vec<Bundle>) -> Result<Self, ConfigError> {
        for bundle in &bundles {
            bundle.validate()?;
        }
        Ok(Self { bundles })
    }

    /// The bundles in load order.
    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    /// Number of bundles.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Check if the registry holds no bundles.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Check whether an id is the master of any bundle.
    pub fn is_master(&self, id: u32) -> bool {
        self.bundles.iter().any(|b| b.master_id == id)
    }
}

/// Load bundle definition files into a registry.
///
/// Each path holds one JSON document:
/// `{ "master_id": 0, "markers": [ { "id": 0, "corners": [[x,y,z], ..] }, .. ] }`
///
/// # Arguments
///
/// * `paths` - One bundle file per bundle to track.
///
/// # Returns
///
/// The validated registry, or the first error encountered.
pub fn load_bundles<P: AsRef<Path>>(paths: &[P]) -> Result<BundleRegistry, ConfigError> {
    let bundles = paths
        .iter()
        .map(|path| -> Result<Bundle, ConfigError> {
            let file = File::open(path)?;
            let bundle: Bundle = serde_json::from_reader(BufReader::new(file))?;
            Ok(bundle)
        })
        .collect::<Result<Vec<_>, _>>()?;

    BundleRegistry::new(bundles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_corners(cx: f64, cy: f64, half: f64) -> [[f64; 3]; 4] {
        [
            [cx - half, cy - half, 0.0],
            [cx + half, cy - half, 0.0],
            [cx + half, cy + half, 0.0],
            [cx - half, cy + half, 0.0],
        ]
    }

    #[test]
    fn test_registry_validation() {
        let bundle = Bundle {
            master_id: 1,
            markers: vec![
                MarkerLayout {
                    id: 1,
                    corners: square_corners(0.0, 0.0, 2.0),
                },
                MarkerLayout {
                    id: 2,
                    corners: square_corners(6.0, 0.0, 2.0),
                },
            ],
        };
        let registry = BundleRegistry::new(vec![bundle]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.is_master(1));
        assert!(!registry.is_master(2));
    }

    #[test]
    fn test_master_must_be_member() {
        let bundle = Bundle {
            master_id: 9,
            markers: vec![MarkerLayout {
                id: 1,
                corners: square_corners(0.0, 0.0, 2.0),
            }],
        };
        assert!(matches!(
            BundleRegistry::new(vec![bundle]),
            Err(ConfigError::MasterNotInBundle(9))
        ));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let layout = MarkerLayout {
            id: 3,
            corners: square_corners(0.0, 0.0, 2.0),
        };
        let bundle = Bundle {
            master_id: 3,
            markers: vec![layout.clone(), layout],
        };
        assert!(matches!(
            BundleRegistry::new(vec![bundle]),
            Err(ConfigError::DuplicateMarker(3))
        ));
    }

    #[test]
    fn test_load_bundle_json() {
        let json = r#"{
            "master_id": 0,
            "markers": [
                { "id": 0, "corners": [[-2,-2,0],[2,-2,0],[2,2,0],[-2,2,0]] },
                { "id": 5, "corners": [[4,-2,0],[8,-2,0],[8,2,0],[4,2,0]] }
            ]
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle0.json");
        std::fs::write(&path, json).unwrap();

        let registry = load_bundles(&[&path]).unwrap();
        assert_eq!(registry.len(), 1);
        let bundle = &registry.bundles()[0];
        assert_eq!(bundle.master_id, 0);
        assert_eq!(bundle.member(5).unwrap().corners[0], [4.0, -2.0, 0.0]);
        assert!(bundle.contains(5));
        assert!(!bundle.contains(6));
    }

    #[test]
    fn test_load_missing_file() {
        let res = load_bundles(&["/nonexistent/bundle.json"]);
        assert!(matches!(res, Err(ConfigError::Io(_))));
    }
}

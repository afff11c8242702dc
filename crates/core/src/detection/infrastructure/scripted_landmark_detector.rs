use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::detection::domain::anchor_point::AnchorPoint;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::frame::Frame;

/// Replays a pre-recorded anchor track by frame index.
///
/// Frames absent from the track report no detection. Lets a session be
/// re-stabilized with different settings without rerunning the model, and
/// drives the state machine deterministically in tests.
pub struct ScriptedLandmarkDetector {
    anchors: HashMap<usize, AnchorPoint>,
}

#[derive(Deserialize)]
struct TrackEntry {
    frame: usize,
    x: f64,
    y: f64,
}

impl ScriptedLandmarkDetector {
    pub fn new(anchors: HashMap<usize, AnchorPoint>) -> Self {
        Self { anchors }
    }

    /// Anchors for consecutive frames starting at 0; `None` entries are misses.
    pub fn from_sequence(sequence: &[Option<AnchorPoint>]) -> Self {
        let anchors = sequence
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.map(|a| (i, a)))
            .collect();
        Self { anchors }
    }

    /// Parses `[{"frame": 0, "x": 300.0, "y": 200.0}, ...]`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<TrackEntry> = serde_json::from_str(json)?;
        let anchors = entries
            .into_iter()
            .map(|e| (e.frame, AnchorPoint::new(e.x, e.y)))
            .collect();
        Ok(Self { anchors })
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl LandmarkDetector for ScriptedLandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<AnchorPoint>, Box<dyn std::error::Error>> {
        Ok(self.anchors.get(&frame.index()).copied())
    }
}

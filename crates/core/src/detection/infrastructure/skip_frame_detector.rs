use crate::detection::domain::anchor_point::AnchorPoint;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::frame::Frame;

/// Decorator that runs detection every N frames, predicting the anchor in between.
///
/// On skipped frames the anchor is linearly extrapolated from the velocity
/// observed between the two most recent real detections, so a moving face
/// doesn't produce a staircase of held positions. A miss on a detection
/// frame is reported for the whole interval and forgets the velocity.
pub struct SkipFrameDetector {
    inner: Box<dyn LandmarkDetector>,
    skip_interval: usize,
    frame_count: usize,
    last_anchor: Option<AnchorPoint>,
    /// Per-frame (dx, dy) between the last two real detections.
    velocity: Option<(f64, f64)>,
    frames_since_detect: usize,
}

impl SkipFrameDetector {
    pub fn new(
        inner: Box<dyn LandmarkDetector>,
        skip_interval: usize,
    ) -> Result<Self, &'static str> {
        if skip_interval < 1 {
            return Err("skip_interval must be >= 1");
        }
        Ok(Self {
            inner,
            skip_interval,
            frame_count: 0,
            last_anchor: None,
            velocity: None,
            frames_since_detect: 0,
        })
    }

    fn record(&mut self, anchor: Option<AnchorPoint>) {
        self.velocity = match (self.last_anchor, anchor) {
            (Some(prev), Some(cur)) => {
                let n = self.skip_interval as f64;
                Some(((cur.x - prev.x) / n, (cur.y - prev.y) / n))
            }
            _ => None,
        };
        self.last_anchor = anchor;
    }
}

impl LandmarkDetector for SkipFrameDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<AnchorPoint>, Box<dyn std::error::Error>> {
        if self.frame_count % self.skip_interval == 0 {
            let anchor = self.inner.detect(frame)?;
            self.record(anchor);
            self.frames_since_detect = 0;
        } else {
            self.frames_since_detect += 1;
        }
        self.frame_count += 1;

        let steps = self.frames_since_detect as f64;
        Ok(self.last_anchor.map(|a| match self.velocity {
            Some((dx, dy)) if steps > 0.0 => AnchorPoint::new(a.x + dx * steps, a.y + dy * steps),
            _ => a,
        }))
    }
}

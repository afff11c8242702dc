//! 5-point face landmarks as produced by the YOLO-pose face model.
//!
//! Order: left eye, right eye, nose, left mouth corner, right mouth corner.
//! The stabilization anchor is the midpoint of the two eyes, which moves with
//! the head but is unaffected by speech or expression.

use crate::detection::domain::anchor_point::AnchorPoint;

const LEFT_EYE: usize = 0;
const RIGHT_EYE: usize = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    /// Points with x <= 0 are treated as invisible.
    points: [(f64, f64); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    pub fn left_eye(&self) -> Option<AnchorPoint> {
        self.visible(LEFT_EYE)
    }

    pub fn right_eye(&self) -> Option<AnchorPoint> {
        self.visible(RIGHT_EYE)
    }

    /// Midpoint between the eyes; `None` unless both eyes are visible.
    pub fn eye_center(&self) -> Option<AnchorPoint> {
        Some(self.left_eye()?.midpoint(&self.right_eye()?))
    }

    fn visible(&self, i: usize) -> Option<AnchorPoint> {
        let (x, y) = self.points[i];
        (x > 0.0).then_some(AnchorPoint::new(x, y))
    }
}

use serde::{Deserialize, Serialize};

/// A tracked point in frame pixel coordinates, typically the eye center.
///
/// Only meaningful relative to the frame geometry it was measured in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorPoint {
    pub x: f64,
    pub y: f64,
}

impl AnchorPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite (not NaN or infinite).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance_to(&self, other: &AnchorPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &AnchorPoint) -> AnchorPoint {
        AnchorPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Point at normalized `(nx, ny)` of a `width` x `height` frame.
    pub fn from_normalized(nx: f64, ny: f64, width: u32, height: u32) -> AnchorPoint {
        AnchorPoint::new(nx * width as f64, ny * height as f64)
    }

    /// Arithmetic mean of `points`, `None` when empty.
    pub fn mean<'a, I>(points: I) -> Option<AnchorPoint>
    where
        I: IntoIterator<Item = &'a AnchorPoint>,
    {
        let (sx, sy, n) = points
            .into_iter()
            .fold((0.0, 0.0, 0usize), |(sx, sy, n), p| (sx + p.x, sy + p.y, n + 1));
        (n > 0).then(|| AnchorPoint::new(sx / n as f64, sy / n as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_is_euclidean() {
        let a = AnchorPoint::new(100.0, 100.0);
        let b = AnchorPoint::new(103.0, 104.0);
        assert_relative_eq!(a.distance_to(&b), 5.0);
        assert_relative_eq!(b.distance_to(&a), 5.0);
    }

    #[test]
    fn test_is_finite() {
        assert!(AnchorPoint::new(1.0, -2.0).is_finite());
        assert!(!AnchorPoint::new(f64::NAN, 0.0).is_finite());
        assert!(!AnchorPoint::new(0.0, f64::NEG_INFINITY).is_finite());
    }

    #[test]
    fn test_midpoint() {
        let left = AnchorPoint::new(440.0, 350.0);
        let right = AnchorPoint::new(560.0, 360.0);
        assert_eq!(left.midpoint(&right), AnchorPoint::new(500.0, 355.0));
    }

    #[test]
    fn test_from_normalized_center() {
        let p = AnchorPoint::from_normalized(0.5, 0.5, 1280, 720);
        assert_eq!(p, AnchorPoint::new(640.0, 360.0));
    }

    #[test]
    fn test_mean_of_points() {
        let pts = [AnchorPoint::new(300.0, 200.0), AnchorPoint::new(310.0, 205.0)];
        let m = AnchorPoint::mean(&pts).unwrap();
        assert_relative_eq!(m.x, 305.0);
        assert_relative_eq!(m.y, 202.5);
    }

    #[test]
    fn test_mean_of_nothing_is_none() {
        let none: [AnchorPoint; 0] = [];
        assert!(AnchorPoint::mean(&none).is_none());
    }
}

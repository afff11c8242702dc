use std::collections::VecDeque;

use crate::detection::domain::anchor_point::AnchorPoint;

/// Bounded FIFO of recent accepted anchors, smoothed by arithmetic mean.
///
/// A moving average over the last K detections absorbs single-frame detector
/// jitter; K trades smoothness against responsiveness to real movement.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorHistory {
    capacity: usize,
    anchors: VecDeque<AnchorPoint>,
}

impl AnchorHistory {
    /// `capacity` is clamped to at least 1; configuration validation rejects 0
    /// before a history is ever built.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            anchors: VecDeque::with_capacity(capacity),
        }
    }

    /// Append `anchor`, evicting the oldest entry when full, and return the
    /// mean of everything retained.
    pub fn update(&mut self, anchor: AnchorPoint) -> AnchorPoint {
        if self.anchors.len() == self.capacity {
            self.anchors.pop_front();
        }
        self.anchors.push_back(anchor);
        self.smoothed().unwrap_or(anchor)
    }

    /// Mean of the retained anchors, `None` when empty.
    pub fn smoothed(&self) -> Option<AnchorPoint> {
        AnchorPoint::mean(&self.anchors)
    }

    pub fn clear(&mut self) {
        self.anchors.clear();
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_first_update_returns_itself() {
        let mut history = AnchorHistory::new(30);
        let smoothed = history.update(AnchorPoint::new(300.0, 200.0));
        assert_eq!(smoothed, AnchorPoint::new(300.0, 200.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_mean_of_two_samples() {
        let mut history = AnchorHistory::new(30);
        history.update(AnchorPoint::new(300.0, 200.0));
        let smoothed = history.update(AnchorPoint::new(310.0, 205.0));
        assert_relative_eq!(smoothed.x, 305.0);
        assert_relative_eq!(smoothed.y, 202.5);
    }

    #[rstest]
    #[case(1, 5)]
    #[case(3, 10)]
    #[case(30, 31)]
    #[case(30, 100)]
    fn test_bounded_to_capacity_and_averages_last_k(#[case] k: usize, #[case] n: usize) {
        let mut history = AnchorHistory::new(k);
        let raw: Vec<AnchorPoint> = (0..n)
            .map(|i| AnchorPoint::new(i as f64 * 3.0, 1000.0 - i as f64))
            .collect();

        let mut smoothed = AnchorPoint::default();
        for a in &raw {
            smoothed = history.update(*a);
            assert!(history.len() <= k);
        }

        assert_eq!(history.len(), k);
        let expected = AnchorPoint::mean(&raw[n - k..]).unwrap();
        assert_relative_eq!(smoothed.x, expected.x, epsilon = 1e-9);
        assert_relative_eq!(smoothed.y, expected.y, epsilon = 1e-9);
    }

    #[test]
    fn test_eviction_is_oldest_first() {
        let mut history = AnchorHistory::new(2);
        history.update(AnchorPoint::new(1.0, 1.0));
        history.update(AnchorPoint::new(2.0, 2.0));
        history.update(AnchorPoint::new(3.0, 3.0));
        assert_eq!(history.len(), 2);
        assert_eq!(history.smoothed(), Some(AnchorPoint::new(2.5, 2.5)));
    }

    #[test]
    fn test_clear_empties() {
        let mut history = AnchorHistory::new(4);
        history.update(AnchorPoint::new(1.0, 1.0));
        history.clear();
        assert!(history.is_empty());
        assert!(history.smoothed().is_none());
        assert_eq!(history.capacity(), 4);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(AnchorHistory::new(0).capacity(), 1);
    }
}

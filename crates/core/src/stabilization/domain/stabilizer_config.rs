use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_HISTORY_CAPACITY, DEFAULT_LOSS_GRACE_FRAMES, DEFAULT_MAX_MOVEMENT,
    DEFAULT_REACQUIRE_AFTER_REJECTIONS,
};
use crate::stabilization::domain::frame_warper::EdgeFill;

/// Where the zero-displacement anchor comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// The first detected anchor of each tracking epoch.
    #[default]
    FirstDetected,
    /// A fixed point at (`target_x`, `target_y`) of the frame size.
    FixedNormalizedPosition,
}

/// What to emit for a frame with no detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossPolicy {
    /// The raw frame, unmodified.
    PassthroughRaw,
    /// The last stabilized output, frozen.
    ReuseLastGood,
    /// The raw frame warped with the last accepted transform.
    #[default]
    ReuseLastTransform,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("history capacity must be at least 1, got {0}")]
    InvalidHistoryCapacity(usize),
    #[error("max movement threshold must be a positive number of pixels, got {0}")]
    InvalidMovementThreshold(f64),
    #[error("target {axis} must be within [0, 1], got {value}")]
    TargetOutOfRange { axis: char, value: f64 },
    #[error("{0} must be at least 1 when set")]
    InvalidFrameCount(&'static str),
}

/// Session parameters for the [`Stabilizer`](super::stabilizer::Stabilizer).
///
/// Read once at session start; a changed config means a new session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Anchors averaged by the smoother (K).
    pub history_capacity: usize,
    /// Largest per-frame anchor jump, in pixels, treated as real motion.
    pub max_movement_threshold: f64,
    pub target_policy: TargetPolicy,
    /// Only read under [`TargetPolicy::FixedNormalizedPosition`].
    pub target_x: f64,
    pub target_y: f64,
    pub loss_policy: LossPolicy,
    pub edge_fill: EdgeFill,
    /// Consecutive misses tolerated before the epoch is discarded. `None`
    /// keeps the epoch forever.
    pub loss_grace_frames: Option<usize>,
    /// Consecutive rejected jumps after which the newest position is
    /// accepted. `None` never overrides the gate.
    pub reacquire_after_rejections: Option<usize>,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_movement_threshold: DEFAULT_MAX_MOVEMENT,
            target_policy: TargetPolicy::FirstDetected,
            target_x: 0.5,
            target_y: 0.5,
            loss_policy: LossPolicy::ReuseLastTransform,
            edge_fill: EdgeFill::Black,
            loss_grace_frames: Some(DEFAULT_LOSS_GRACE_FRAMES),
            reacquire_after_rejections: Some(DEFAULT_REACQUIRE_AFTER_REJECTIONS),
        }
    }
}

impl StabilizerConfig {
    /// Fixed-target variant of the default config.
    pub fn fixed_target(x: f64, y: f64) -> Self {
        Self {
            target_policy: TargetPolicy::FixedNormalizedPosition,
            target_x: x,
            target_y: y,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidHistoryCapacity(self.history_capacity));
        }
        if !(self.max_movement_threshold.is_finite() && self.max_movement_threshold > 0.0) {
            return Err(ConfigError::InvalidMovementThreshold(
                self.max_movement_threshold,
            ));
        }
        for (axis, value) in [('x', self.target_x), ('y', self.target_y)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::TargetOutOfRange { axis, value });
            }
        }
        if self.loss_grace_frames == Some(0) {
            return Err(ConfigError::InvalidFrameCount("loss_grace_frames"));
        }
        if self.reacquire_after_rejections == Some(0) {
            return Err(ConfigError::InvalidFrameCount(
                "reacquire_after_rejections",
            ));
        }
        Ok(())
    }
}

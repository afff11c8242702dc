//! Per-frame stabilization state machine.
//!
//! ```text
//! UNINITIALIZED ──detect──▶ TRACKING ◀──detect──┐
//!       ▲                      │                │
//!       │                    miss               │
//!       │                      ▼                │
//!       └──grace exceeded──── LOST ─────────────┘
//! ```
//!
//! One [`Stabilizer`] per capture session. It owns all tracking state, so
//! concurrent sessions need separate instances and nothing is shared.

use thiserror::Error;

use crate::detection::domain::anchor_point::AnchorPoint;
use crate::shared::frame::Frame;
use crate::stabilization::domain::anchor_history::AnchorHistory;
use crate::stabilization::domain::frame_warper::FrameWarper;
use crate::stabilization::domain::stabilizer_config::{
    ConfigError, LossPolicy, StabilizerConfig, TargetPolicy,
};
use crate::stabilization::domain::transform::{ImplausibleJump, TransformSynthesizer, Translation};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingPhase {
    Uninitialized,
    Tracking,
    Lost,
}

/// What a no-detection frame was replaced with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LossOutput {
    Raw,
    LastGood,
    LastTransform(Translation),
}

/// What happened to one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOutcome {
    /// First anchor of an epoch; frame passed through untouched.
    Initialized,
    /// New transform synthesized and applied.
    Warped(Translation),
    /// Anomaly gate refused the anchor; previous transform reapplied.
    HeldTransform {
        translation: Translation,
        jump: ImplausibleJump,
    },
    /// Sustained rejections overridden; history restarted at the new position.
    Reacquired(Translation),
    /// No detection.
    Lost(LossOutput),
}

impl FrameOutcome {
    /// The translation applied to this frame's pixels, if any.
    pub fn translation(&self) -> Option<Translation> {
        match *self {
            FrameOutcome::Initialized => Some(Translation::IDENTITY),
            FrameOutcome::Warped(t)
            | FrameOutcome::Reacquired(t)
            | FrameOutcome::HeldTransform { translation: t, .. }
            | FrameOutcome::Lost(LossOutput::LastTransform(t)) => Some(t),
            FrameOutcome::Lost(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Stabilized {
    pub frame: Frame,
    pub outcome: FrameOutcome,
}

#[derive(Error, Debug)]
pub enum StabilizeError {
    #[error(
        "frame size changed mid-session: expected {}x{}x{}, got {}x{}x{}",
        expected.0, expected.1, expected.2, actual.0, actual.1, actual.2
    )]
    DimensionMismatch {
        expected: (u32, u32, u8),
        actual: (u32, u32, u8),
    },
    #[error("warp failed: {0}")]
    Warp(String),
}

/// Everything the machine remembers between frames.
#[derive(Clone, Debug)]
pub struct StabilizerState {
    phase: TrackingPhase,
    last_good_frame: Option<Frame>,
    last_transform: Option<Translation>,
    reference_anchor: Option<AnchorPoint>,
    history: AnchorHistory,
    last_anchor: Option<AnchorPoint>,
    frame_size: Option<(u32, u32, u8)>,
    frames_lost: usize,
    consecutive_rejections: usize,
}

impl StabilizerState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            phase: TrackingPhase::Uninitialized,
            last_good_frame: None,
            last_transform: None,
            reference_anchor: None,
            history: AnchorHistory::new(history_capacity),
            last_anchor: None,
            frame_size: None,
            frames_lost: 0,
            consecutive_rejections: 0,
        }
    }

    pub fn phase(&self) -> TrackingPhase {
        self.phase
    }

    pub fn last_good_frame(&self) -> Option<&Frame> {
        self.last_good_frame.as_ref()
    }

    pub fn last_transform(&self) -> Option<Translation> {
        self.last_transform
    }

    pub fn reference_anchor(&self) -> Option<AnchorPoint> {
        self.reference_anchor
    }

    pub fn history(&self) -> &AnchorHistory {
        &self.history
    }

    /// Latest anchor that passed the anomaly gate.
    pub fn last_anchor(&self) -> Option<AnchorPoint> {
        self.last_anchor
    }

    pub fn frames_lost(&self) -> usize {
        self.frames_lost
    }

    pub fn consecutive_rejections(&self) -> usize {
        self.consecutive_rejections
    }
}

pub struct Stabilizer {
    config: StabilizerConfig,
    synthesizer: TransformSynthesizer,
    warper: Box<dyn FrameWarper>,
    state: StabilizerState,
}

impl Stabilizer {
    pub fn new(
        config: StabilizerConfig,
        warper: Box<dyn FrameWarper>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            synthesizer: TransformSynthesizer::new(config.max_movement_threshold),
            state: StabilizerState::new(config.history_capacity),
            warper,
            config,
        })
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn state(&self) -> &StabilizerState {
        &self.state
    }

    /// Stabilize one frame given its detection result.
    ///
    /// Missing detections and implausible jumps are handled here and never
    /// surface as errors; only a frame-size change or a warper failure does.
    pub fn process(
        &mut self,
        frame: &Frame,
        detection: Option<AnchorPoint>,
    ) -> Result<Stabilized, StabilizeError> {
        self.check_dimensions(frame)?;

        if self.state.reference_anchor.is_none()
            && self.config.target_policy == TargetPolicy::FixedNormalizedPosition
        {
            self.state.reference_anchor = Some(AnchorPoint::from_normalized(
                self.config.target_x,
                self.config.target_y,
                frame.width(),
                frame.height(),
            ));
        }

        match detection {
            None => self.on_miss(frame),
            Some(anchor) if !anchor.is_finite() => {
                log::debug!(
                    "frame {}: ignoring non-finite anchor ({}, {})",
                    frame.index(),
                    anchor.x,
                    anchor.y
                );
                self.on_miss(frame)
            }
            Some(anchor) if self.state.phase == TrackingPhase::Uninitialized => {
                Ok(self.on_first_anchor(frame, anchor))
            }
            Some(anchor) => self.on_anchor(frame, anchor),
        }
    }

    fn check_dimensions(&mut self, frame: &Frame) -> Result<(), StabilizeError> {
        let actual = frame.dimensions();
        match self.state.frame_size {
            Some(expected) if expected != actual => {
                Err(StabilizeError::DimensionMismatch { expected, actual })
            }
            Some(_) => Ok(()),
            None => {
                self.state.frame_size = Some(actual);
                Ok(())
            }
        }
    }

    fn on_first_anchor(&mut self, frame: &Frame, anchor: AnchorPoint) -> Stabilized {
        let state = &mut self.state;
        if self.config.target_policy == TargetPolicy::FirstDetected {
            state.reference_anchor = Some(anchor);
        }
        state.history.clear();
        state.history.update(anchor);
        state.last_anchor = Some(anchor);
        state.last_transform = Some(Translation::IDENTITY);
        state.last_good_frame = Some(frame.clone());
        state.frames_lost = 0;
        state.consecutive_rejections = 0;
        state.phase = TrackingPhase::Tracking;
        log::debug!(
            "frame {}: UNINITIALIZED -> TRACKING at ({:.1}, {:.1})",
            frame.index(),
            anchor.x,
            anchor.y
        );

        Stabilized {
            frame: frame.clone(),
            outcome: FrameOutcome::Initialized,
        }
    }

    fn on_anchor(&mut self, frame: &Frame, anchor: AnchorPoint) -> Result<Stabilized, StabilizeError> {
        if self.state.phase == TrackingPhase::Lost {
            log::debug!(
                "frame {}: LOST -> TRACKING after {} frame(s)",
                frame.index(),
                self.state.frames_lost
            );
            self.state.phase = TrackingPhase::Tracking;
        }
        self.state.frames_lost = 0;

        let reference = self.state.reference_anchor.unwrap_or(anchor);
        let previous = self.state.last_anchor;

        let gated = self.synthesizer.synthesize(
            &reference,
            &anchor,
            previous.as_ref(),
            &mut self.state.history,
        );
        let (translation, reacquired) = match gated {
            Ok(translation) => (translation, false),
            Err(jump) => {
                self.state.consecutive_rejections += 1;
                let streak = self.state.consecutive_rejections;
                if !self
                    .config
                    .reacquire_after_rejections
                    .is_some_and(|limit| streak >= limit)
                {
                    return self.hold(frame, jump);
                }

                log::info!(
                    "frame {}: accepting new position after {streak} rejected jumps",
                    frame.index()
                );
                self.state.history.clear();
                match self
                    .synthesizer
                    .synthesize(&reference, &anchor, None, &mut self.state.history)
                {
                    Ok(translation) => (translation, true),
                    Err(jump) => return self.hold(frame, jump),
                }
            }
        };

        let state = &mut self.state;
        state.last_anchor = Some(anchor);
        state.last_transform = Some(translation);
        state.consecutive_rejections = 0;

        let warped = self.warp(frame, &translation)?;
        self.state.last_good_frame = Some(warped.clone());
        Ok(Stabilized {
            frame: warped,
            outcome: if reacquired {
                FrameOutcome::Reacquired(translation)
            } else {
                FrameOutcome::Warped(translation)
            },
        })
    }

    /// Refuse the anchor and reapply the previous transform.
    fn hold(&self, frame: &Frame, jump: ImplausibleJump) -> Result<Stabilized, StabilizeError> {
        log::debug!(
            "frame {}: rejected jump of {:.1}px (limit {:.1}px)",
            frame.index(),
            jump.distance,
            jump.threshold
        );
        let translation = self.state.last_transform.unwrap_or(Translation::IDENTITY);
        Ok(Stabilized {
            frame: self.warp(frame, &translation)?,
            outcome: FrameOutcome::HeldTransform { translation, jump },
        })
    }

    fn on_miss(&mut self, frame: &Frame) -> Result<Stabilized, StabilizeError> {
        if self.state.phase == TrackingPhase::Uninitialized {
            return Ok(Stabilized {
                frame: frame.clone(),
                outcome: FrameOutcome::Lost(LossOutput::Raw),
            });
        }

        if self.state.phase == TrackingPhase::Tracking {
            log::debug!("frame {}: TRACKING -> LOST", frame.index());
            self.state.phase = TrackingPhase::Lost;
        }
        self.state.frames_lost += 1;

        if self
            .config
            .loss_grace_frames
            .is_some_and(|grace| self.state.frames_lost > grace)
        {
            self.end_epoch(frame.index());
            return Ok(Stabilized {
                frame: frame.clone(),
                outcome: FrameOutcome::Lost(LossOutput::Raw),
            });
        }

        let (out, loss) = match (self.config.loss_policy, &self.state) {
            (LossPolicy::ReuseLastGood, StabilizerState {
                last_good_frame: Some(good),
                ..
            }) => (good.reindexed(frame.index()), LossOutput::LastGood),
            (LossPolicy::ReuseLastTransform, StabilizerState {
                last_transform: Some(t),
                ..
            }) => {
                let t = *t;
                (self.warp(frame, &t)?, LossOutput::LastTransform(t))
            }
            _ => (frame.clone(), LossOutput::Raw),
        };

        Ok(Stabilized {
            frame: out,
            outcome: FrameOutcome::Lost(loss),
        })
    }

    /// Drop the current tracking epoch after a loss longer than the grace period.
    fn end_epoch(&mut self, frame_index: usize) {
        log::info!(
            "frame {frame_index}: face lost for {} frames, restarting tracking",
            self.state.frames_lost
        );
        let state = &mut self.state;
        state.phase = TrackingPhase::Uninitialized;
        state.history.clear();
        state.last_anchor = None;
        state.last_transform = None;
        state.last_good_frame = None;
        state.consecutive_rejections = 0;
        state.frames_lost = 0;
        if self.config.target_policy == TargetPolicy::FirstDetected {
            state.reference_anchor = None;
        }
    }

    fn warp(&self, frame: &Frame, translation: &Translation) -> Result<Frame, StabilizeError> {
        self.warper
            .warp(frame, translation)
            .map_err(|e| StabilizeError::Warp(e.to_string()))
    }
}

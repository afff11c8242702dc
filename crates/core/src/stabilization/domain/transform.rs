use crate::detection::domain::anchor_point::AnchorPoint;
use crate::stabilization::domain::anchor_history::AnchorHistory;

/// A 2-D translation in pixels; output pixel `(x, y)` samples input `(x - tx, y - ty)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Translation {
    pub tx: f64,
    pub ty: f64,
}

impl Translation {
    pub const IDENTITY: Translation = Translation { tx: 0.0, ty: 0.0 };

    pub fn new(tx: f64, ty: f64) -> Self {
        Self { tx, ty }
    }

    /// Shift that moves `current` onto `reference`.
    pub fn between(reference: &AnchorPoint, current: &AnchorPoint) -> Self {
        Self::new(reference.x - current.x, reference.y - current.y)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Whole-pixel offsets, rounded half away from zero.
    pub fn rounded(&self) -> (i64, i64) {
        (self.tx.round() as i64, self.ty.round() as i64)
    }
}

/// Why a candidate anchor was refused.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImplausibleJump {
    pub distance: f64,
    pub threshold: f64,
}

/// Converts anchor displacement into a corrective translation, gated by a
/// per-frame movement limit.
///
/// Cascade-style detectors occasionally lock onto a spurious region for one
/// frame; following it would snap the image. Jumps larger than
/// `max_movement` from the previously accepted anchor are refused and the
/// caller keeps its previous transform.
#[derive(Clone, Copy, Debug)]
pub struct TransformSynthesizer {
    max_movement: f64,
}

impl TransformSynthesizer {
    pub fn new(max_movement: f64) -> Self {
        Self { max_movement }
    }

    pub fn max_movement(&self) -> f64 {
        self.max_movement
    }

    /// The anomaly gate alone: `Err` when `candidate` is too far from `previous`.
    ///
    /// With no previous anchor (start of an epoch) every finite candidate
    /// passes. A non-finite distance is always refused.
    pub fn check(
        &self,
        previous: Option<&AnchorPoint>,
        candidate: &AnchorPoint,
    ) -> Result<(), ImplausibleJump> {
        let distance = match previous {
            Some(prev) => prev.distance_to(candidate),
            None if candidate.is_finite() => return Ok(()),
            None => f64::NAN,
        };
        if !(distance <= self.max_movement) {
            return Err(ImplausibleJump {
                distance,
                threshold: self.max_movement,
            });
        }
        Ok(())
    }

    /// Gate `candidate` against `previous`; if it passes, add it to
    /// `history` and return the shift that moves the smoothed anchor onto
    /// `reference`. A refused candidate leaves `history` untouched.
    pub fn synthesize(
        &self,
        reference: &AnchorPoint,
        candidate: &AnchorPoint,
        previous: Option<&AnchorPoint>,
        history: &mut AnchorHistory,
    ) -> Result<Translation, ImplausibleJump> {
        self.check(previous, candidate)?;
        let smoothed = history.update(*candidate);
        Ok(Translation::between(reference, &smoothed))
    }
}

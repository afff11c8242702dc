use serde::{Deserialize, Serialize};

use crate::shared::frame::Frame;
use crate::stabilization::domain::transform::Translation;

/// How pixels uncovered by a translation are filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeFill {
    /// Zero every channel of exposed pixels.
    #[default]
    Black,
    /// Repeat the nearest source row/column into the exposed band.
    Replicate,
}

/// Domain interface for applying a stabilizing translation to a frame.
///
/// Implementations return a new frame with exactly the input's width,
/// height, channel count and index; the input is never modified.
pub trait FrameWarper: Send {
    fn warp(
        &self,
        frame: &Frame,
        translation: &Translation,
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}

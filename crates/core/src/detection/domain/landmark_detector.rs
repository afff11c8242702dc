use crate::detection::domain::anchor_point::AnchorPoint;
use crate::shared::frame::Frame;

/// Domain interface for locating the stabilization anchor in a frame.
///
/// `Ok(None)` means no face (or no usable eye pair) was found; that is an
/// ordinary outcome, not an error. `Err` is reserved for failures of the
/// detector itself, such as an inference runtime error.
///
/// Implementations may be stateful (e.g., extrapolating across skipped
/// frames), hence `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<AnchorPoint>, Box<dyn std::error::Error>>;
}

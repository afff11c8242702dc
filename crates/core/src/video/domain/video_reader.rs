use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Source of raw frames: a video file or a live capture device.
///
/// Implementations own decoding and pixel conversion; the pipeline only
/// sees RGB [`Frame`]s in capture order.
pub trait VideoReader: Send {
    /// Opens the source and returns its stream properties.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Frames in capture order. Ends when the source is exhausted; a live
    /// device never ends on its own.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}

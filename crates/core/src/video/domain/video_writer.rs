use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sink for stabilized frames.
///
/// `open` receives metadata whose dimensions were probed from the first
/// decoded frame, so sinks never have to guess the geometry.
pub trait VideoWriter: Send {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered output. Safe to call more than once.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

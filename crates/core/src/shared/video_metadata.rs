use std::path::PathBuf;

/// Stream properties reported by a [`VideoReader`] and consumed by writers.
///
/// `total_frames` is 0 for live sources whose length is unknown.
///
/// [`VideoReader`]: crate::video::domain::video_reader::VideoReader
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Same stream with the frame geometry replaced.
    ///
    /// The session probes its first frame before opening the sink; the
    /// probed size wins over what the container header claimed.
    pub fn with_dimensions(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self.clone()
        }
    }

    pub fn is_live(&self) -> bool {
        self.total_frames == 0
    }
}

use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Writes each frame as `frame_000000.png`, `frame_000001.png`, ... into a
/// directory, using the `image` crate.
pub struct ImageSequenceWriter {
    output_size: Option<(u32, u32)>,
    dir: Option<PathBuf>,
    written: usize,
}

impl ImageSequenceWriter {
    pub fn new() -> Self {
        Self {
            output_size: None,
            dir: None,
            written: 0,
        }
    }

    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_size = Some((width, height));
        self
    }

    pub fn frame_path(dir: &Path, n: usize) -> PathBuf {
        dir.join(format!("frame_{n:06}.png"))
    }
}

impl Default for ImageSequenceWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for ImageSequenceWriter {
    fn open(
        &mut self,
        path: &Path,
        _metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::create_dir_all(path)?;
        self.dir = Some(path.to_path_buf());
        self.written = 0;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let dir = self.dir.as_ref().ok_or("ImageSequenceWriter: not opened")?;
        let path = Self::frame_path(dir, self.written);

        let image = match frame.channels() {
            3 => image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                .map(image::DynamicImage::ImageRgb8),
            1 => image::GrayImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                .map(image::DynamicImage::ImageLuma8),
            n => return Err(format!("ImageSequenceWriter: unsupported channel count {n}").into()),
        }
        .ok_or("ImageSequenceWriter: frame data does not match its dimensions")?;

        let image = match self.output_size {
            Some((w, h)) if (w, h) != (frame.width(), frame.height()) => {
                image.resize_exact(w, h, image::imageops::FilterType::Triangle)
            }
            _ => image,
        };

        image.save(&path)?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(dir) = self.dir.take() {
            log::debug!("wrote {} images to {}", self.written, dir.display());
        }
        Ok(())
    }
}

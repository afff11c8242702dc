use std::path::Path;

use crate::shared::constants::FALLBACK_FPS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Encodes stabilized frames to a video file via ffmpeg-next.
///
/// Uses libx264 when the linked ffmpeg has it and falls back to the
/// built-in MPEG-4 Part 2 encoder otherwise. Frames are RGB24; the scaler
/// converts them to YUV420P and, when an output size is set, resizes them in
/// the same pass.
pub struct FfmpegWriter {
    output_size: Option<(u32, u32)>,
    quality: Option<u8>,
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: usize,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

const MAX_CRF: u8 = 51;
/// `FF_QP2LAMBDA` from libavutil.
const QP2LAMBDA: i32 = 118;

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            output_size: None,
            quality: None,
            octx: None,
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            fps: 0,
            frame_count: 0,
        }
    }

    /// Encode at `width`x`height` instead of the incoming frame size.
    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_size = Some((width, height));
        self
    }

    /// Constant rate factor, 0 (lossless) to 51 (worst).
    pub fn with_quality(mut self, crf: u8) -> Self {
        self.quality = Some(crf.min(MAX_CRF));
        self
    }

    fn encoder_options(&self, codec: &ffmpeg_next::Codec) -> ffmpeg_next::Dictionary<'static> {
        let mut opts = ffmpeg_next::Dictionary::new();
        let Some(crf) = self.quality else {
            return opts;
        };
        if codec.id() == ffmpeg_next::codec::Id::H264 {
            opts.set("crf", &crf.to_string());
        } else {
            // mpeg4 has no CRF; map onto its 1..=31 quantizer scale
            let q = 1 + i32::from(crf) * 30 / i32::from(MAX_CRF);
            opts.set("flags", "+qscale");
            opts.set("global_quality", &(q * QP2LAMBDA).to_string());
        }
        opts
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// YUV420P needs even dimensions.
fn even(v: u32) -> u32 {
    (v & !1).max(2)
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let (out_w, out_h) = self.output_size.unwrap_or((metadata.width, metadata.height));
        let (out_w, out_h) = (even(out_w), even(out_h));
        let fps = match metadata.fps.round() as i32 {
            f if f > 0 => f,
            _ => FALLBACK_FPS as i32,
        };

        let mut octx = ffmpeg_next::format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find_by_name("libx264")
            .or_else(|| ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4))
            .ok_or("no H.264 or MPEG-4 encoder available")?;
        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder_ctx.set_width(out_w);
        encoder_ctx.set_height(out_h);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(self.encoder_options(&codec))?;
        ost.set_parameters(&encoder);
        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            ffmpeg_next::format::Pixel::YUV420P,
            out_w,
            out_h,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!(
            "writing {} ({}x{} @ {fps} fps, {})",
            path.display(),
            out_w,
            out_h,
            codec.name()
        );

        self.width = metadata.width;
        self.height = metadata.height;
        self.fps = fps;
        self.frame_count = 0;
        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let (Some(encoder), Some(scaler), Some(octx)) =
            (self.encoder.as_mut(), self.scaler.as_mut(), self.octx.as_mut())
        else {
            return Err("FfmpegWriter: not opened".into());
        };
        if (frame.width(), frame.height(), frame.channels()) != (self.width, self.height, 3) {
            return Err(format!(
                "FfmpegWriter: expected {}x{} RGB frame, got {}x{}x{}",
                self.width,
                self.height,
                frame.width(),
                frame.height(),
                frame.channels()
            )
            .into());
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb.stride(0);
        let row_bytes = frame.stride();
        for (dst, src) in rgb
            .data_mut(0)
            .chunks_mut(stride)
            .zip(frame.data().chunks_exact(row_bytes))
        {
            dst[..row_bytes].copy_from_slice(src);
        }

        let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(self.frame_count as i64));

        encoder.send_frame(&yuv)?;
        drain(encoder, octx, self.fps)?;

        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let (Some(encoder), Some(octx)) = (self.encoder.as_mut(), self.octx.as_mut()) {
            encoder.send_eof()?;
            drain(encoder, octx, self.fps)?;
            octx.write_trailer()?;
            log::debug!("encoded {} frames", self.frame_count);
        }

        self.octx = None;
        self.encoder = None;
        self.scaler = None;
        Ok(())
    }
}

/// Writes every packet the encoder has ready.
fn drain(
    encoder: &mut ffmpeg_next::codec::encoder::video::Encoder,
    octx: &mut ffmpeg_next::format::context::Output,
    fps: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let ost_time_base = octx
        .stream(0)
        .ok_or("FfmpegWriter: output stream missing")?
        .time_base();

    let mut encoded = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(0);
        encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::video_reader::VideoReader;
    use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
    use rstest::rstest;

    fn metadata(w: u32, h: u32, fps: f64) -> VideoMetadata {
        VideoMetadata {
            width: w,
            height: h,
            fps,
            total_frames: 0,
            codec: String::new(),
            source_path: None,
        }
    }

    fn solid_frame(index: usize, w: u32, h: u32, value: u8) -> Frame {
        Frame::new(vec![value; (w * h * 3) as usize], w, h, 3, index)
    }

    fn encoded_size(path: &Path) -> (u32, u32) {
        let mut reader = FfmpegReader::new();
        let meta = reader.open(path).unwrap();
        (meta.width, meta.height)
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        for i in 0..3 {
            writer.write(&solid_frame(i, 160, 120, 128)).unwrap();
        }
        writer.close().unwrap();

        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert_eq!(encoded_size(&path), (160, 120));
    }

    #[test]
    fn test_output_size_rescales() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaled.mp4");

        let mut writer = FfmpegWriter::new().with_output_size(320, 240);
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        writer.write(&solid_frame(0, 160, 120, 90)).unwrap();
        writer.close().unwrap();

        assert_eq!(encoded_size(&path), (320, 240));
    }

    #[rstest]
    #[case(0)]
    #[case(23)]
    #[case(51)]
    fn test_quality_accepted(#[case] crf: u8) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.mp4");

        let mut writer = FfmpegWriter::new().with_quality(crf);
        writer.open(&path, &metadata(64, 48, 30.0)).unwrap();
        writer.write(&solid_frame(0, 64, 48, 10)).unwrap();
        writer.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_fps_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nofps.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(64, 48, 0.0)).unwrap();
        assert_eq!(writer.fps, 30);
        writer.close().unwrap();
    }

    #[test]
    fn test_write_without_open_is_error() {
        let mut writer = FfmpegWriter::new();
        assert!(writer.write(&solid_frame(0, 160, 120, 128)).is_err());
    }

    #[test]
    fn test_wrong_frame_size_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        assert!(writer.write(&solid_frame(0, 80, 60, 0)).is_err());
        writer.close().unwrap();
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        writer.write(&solid_frame(0, 160, 120, 128)).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_roundtrip_brightness() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.mp4");

        let mut writer = FfmpegWriter::new();
        writer.open(&path, &metadata(160, 120, 30.0)).unwrap();
        for i in 0..3 {
            writer.write(&solid_frame(i, 160, 120, 128)).unwrap();
        }
        writer.close().unwrap();

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        let frames: Vec<_> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);

        let avg = frames[0].data().iter().map(|&b| b as f64).sum::<f64>()
            / frames[0].data().len() as f64;
        assert!((avg - 128.0).abs() < 40.0, "average {avg} should be near 128");
    }
}

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::video_metadata::VideoMetadata;
use crate::stabilization::domain::stabilizer::{FrameOutcome, Stabilizer};
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

pub type ProgressCallback = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Per-session counts of what happened to each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub frames: usize,
    pub detected: usize,
    pub rejected: usize,
    pub reacquired: usize,
    pub lost: usize,
    pub cancelled: bool,
}

impl SessionReport {
    fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Initialized | FrameOutcome::Warped(_) => self.detected += 1,
            FrameOutcome::HeldTransform { .. } => {
                self.detected += 1;
                self.rejected += 1;
            }
            FrameOutcome::Reacquired(_) => {
                self.detected += 1;
                self.reacquired += 1;
            }
            FrameOutcome::Lost(_) => self.lost += 1,
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// One capture session: read → detect → stabilize → write, strictly in
/// capture order on the calling thread.
///
/// The sink is opened only after the first frame has been stabilized, so it
/// is sized from real frame geometry rather than container headers. Reader
/// errors end the session; the sink is still closed so everything written so
/// far is playable.
pub struct StabilizeVideoUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    detector: Box<dyn LandmarkDetector>,
    stabilizer: Stabilizer,
    logger: Box<dyn PipelineLogger>,
    max_frames: Option<usize>,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
}

impl StabilizeVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        detector: Box<dyn LandmarkDetector>,
        stabilizer: Stabilizer,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            writer,
            detector,
            stabilizer,
            logger,
            max_frames: None,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop after `n` frames; the only way to end a live capture besides
    /// cancellation.
    pub fn with_max_frames(mut self, n: usize) -> Self {
        self.max_frames = Some(n);
        self
    }

    /// Called after each written frame with `(written, total)`; returning
    /// `false` stops the session cleanly.
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn execute(
        &mut self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<SessionReport, Box<dyn std::error::Error>> {
        let metadata = self.reader.open(input_path)?;
        self.logger.info(&format!(
            "Input: {}x{} @ {:.2} fps{}",
            metadata.width,
            metadata.height,
            metadata.fps,
            if metadata.is_live() {
                String::from(" (live)")
            } else {
                format!(", {} frames", metadata.total_frames)
            }
        ));

        let mut sink_open = false;
        let result = self.run(&metadata, output_path, &mut sink_open);

        self.reader.close();
        let closed = if sink_open {
            self.writer.close()
        } else {
            Ok(())
        };

        let report = result?;
        closed?;

        self.logger.summary();
        if report.cancelled {
            self.logger.info(&format!("Stopped after {} frames", report.frames));
        }
        Ok(report)
    }

    fn run(
        &mut self,
        metadata: &VideoMetadata,
        output_path: &Path,
        sink_open: &mut bool,
    ) -> Result<SessionReport, Box<dyn std::error::Error>> {
        let Self {
            reader,
            writer,
            detector,
            stabilizer,
            logger,
            max_frames,
            on_progress,
            cancelled,
        } = self;

        let total = match (*max_frames, metadata.total_frames) {
            (Some(max), 0) => max,
            (Some(max), t) => max.min(t),
            (None, t) => t,
        };

        let mut report = SessionReport::default();
        let mut frames = reader.frames();

        loop {
            if cancelled.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }
            if max_frames.is_some_and(|max| report.frames >= max) {
                break;
            }

            let start = Instant::now();
            let Some(frame) = frames.next() else {
                break;
            };
            let frame = frame?;
            logger.timing("read", elapsed_ms(start));

            let start = Instant::now();
            let anchor = detector.detect(&frame).unwrap_or_else(|e| {
                log::warn!("frame {}: detector failed, treating as no face: {e}", frame.index());
                None
            });
            logger.timing("detect", elapsed_ms(start));

            let start = Instant::now();
            let stabilized = stabilizer.process(&frame, anchor)?;
            logger.timing("stabilize", elapsed_ms(start));

            report.record(&stabilized.outcome);
            logger.metric("detected", f64::from(u8::from(anchor.is_some())));
            logger.metric(
                "rejected",
                f64::from(u8::from(matches!(
                    stabilized.outcome,
                    FrameOutcome::HeldTransform { .. }
                ))),
            );

            if !*sink_open {
                let out = &stabilized.frame;
                writer.open(output_path, &metadata.with_dimensions(out.width(), out.height()))?;
                *sink_open = true;
            }

            let start = Instant::now();
            writer.write(&stabilized.frame)?;
            logger.timing("write", elapsed_ms(start));

            report.frames += 1;
            logger.progress(report.frames, total);
            if let Some(callback) = on_progress.as_ref() {
                if !callback(report.frames, total) {
                    report.cancelled = true;
                    break;
                }
            }
        }

        if report.frames == 0 && !report.cancelled {
            return Err("No frames decoded from input".into());
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::anchor_point::AnchorPoint;
    use crate::detection::infrastructure::scripted_landmark_detector::ScriptedLandmarkDetector;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;
    use crate::stabilization::domain::stabilizer_config::StabilizerConfig;
    use crate::stabilization::domain::transform::Translation;
    use crate::stabilization::infrastructure::translation_warper::TranslationWarper;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    const W: u32 = 48;
    const H: u32 = 32;

    // --- Stubs ---

    struct StubReader {
        frames: Vec<Frame>,
        fail_at: Option<usize>,
        total_frames: usize,
        closed: Arc<Mutex<bool>>,
    }

    impl StubReader {
        fn new(count: usize) -> Self {
            Self {
                frames: (0..count).map(frame).collect(),
                fail_at: None,
                total_frames: count,
                closed: Arc::new(Mutex::new(false)),
            }
        }

        fn live(count: usize) -> Self {
            Self {
                total_frames: 0,
                ..Self::new(count)
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            // Header deliberately disagrees with the real frames
            Ok(VideoMetadata {
                width: 1,
                height: 1,
                fps: 24.0,
                total_frames: self.total_frames,
                codec: "stub".to_string(),
                source_path: None,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let fail_at = self.fail_at;
            Box::new(self.frames.drain(..).map(move |f| {
                if Some(f.index()) == fail_at {
                    Err("camera unplugged".into())
                } else {
                    Ok(f)
                }
            }))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    #[derive(Default)]
    struct Recorded {
        opened: Option<VideoMetadata>,
        frames: Vec<Frame>,
        closed: bool,
    }

    struct StubWriter {
        recorded: Arc<Mutex<Recorded>>,
    }

    impl VideoWriter for StubWriter {
        fn open(
            &mut self,
            _path: &Path,
            metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.recorded.lock().unwrap().opened = Some(metadata.clone());
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.recorded.lock().unwrap().frames.push(frame.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.recorded.lock().unwrap().closed = true;
            Ok(())
        }
    }

    struct FailingDetector;

    impl LandmarkDetector for FailingDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Option<AnchorPoint>, Box<dyn std::error::Error>> {
            Err("inference failed".into())
        }
    }

    // --- Helpers ---

    fn frame(index: usize) -> Frame {
        let data = (0..(W * H * 3) as usize)
            .map(|i| ((i * 3 + index * 11) % 256) as u8)
            .collect();
        Frame::new(data, W, H, 3, index)
    }

    fn at(x: f64, y: f64) -> Option<AnchorPoint> {
        Some(AnchorPoint::new(x, y))
    }

    fn stabilizer(config: StabilizerConfig) -> Stabilizer {
        let warper = TranslationWarper::new(config.edge_fill);
        Stabilizer::new(config, Box::new(warper)).unwrap()
    }

    fn use_case(
        reader: StubReader,
        track: &[Option<AnchorPoint>],
        config: StabilizerConfig,
    ) -> (StabilizeVideoUseCase, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let uc = StabilizeVideoUseCase::new(
            Box::new(reader),
            Box::new(StubWriter {
                recorded: recorded.clone(),
            }),
            Box::new(ScriptedLandmarkDetector::from_sequence(track)),
            stabilizer(config),
            Box::new(NullPipelineLogger),
        );
        (uc, recorded)
    }

    fn run(uc: &mut StabilizeVideoUseCase) -> Result<SessionReport, Box<dyn std::error::Error>> {
        uc.execute(Path::new("in.mp4"), Path::new("out.mp4"))
    }

    // --- Tests ---

    #[test]
    fn test_every_frame_written_in_order() {
        let track = [at(20.0, 16.0), at(22.0, 16.0), None, at(23.0, 17.0)];
        let (mut uc, recorded) = use_case(StubReader::new(4), &track, StabilizerConfig::default());

        let report = run(&mut uc).unwrap();

        let rec = recorded.lock().unwrap();
        let indices: Vec<usize> = rec.frames.iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(rec.closed);
        assert_eq!(
            report,
            SessionReport {
                frames: 4,
                detected: 3,
                lost: 1,
                ..SessionReport::default()
            }
        );
    }

    #[test]
    fn test_sink_sized_from_first_frame() {
        let (mut uc, recorded) = use_case(StubReader::new(2), &[], StabilizerConfig::default());
        run(&mut uc).unwrap();

        let opened = recorded.lock().unwrap().opened.clone().unwrap();
        assert_eq!((opened.width, opened.height), (W, H));
        assert_eq!(opened.fps, 24.0);
    }

    #[test]
    fn test_output_matches_stabilizer() {
        let track = [at(20.0, 16.0), at(24.0, 18.0)];
        let (mut uc, recorded) = use_case(StubReader::new(2), &track, StabilizerConfig::default());
        run(&mut uc).unwrap();

        let mut reference = stabilizer(StabilizerConfig::default());
        reference.process(&frame(0), track[0]).unwrap();
        let expected = reference.process(&frame(1), track[1]).unwrap();
        assert_eq!(expected.outcome, FrameOutcome::Warped(Translation::new(-2.0, -1.0)));

        let rec = recorded.lock().unwrap();
        assert_eq!(rec.frames[0], frame(0));
        assert_eq!(rec.frames[1], expected.frame);
    }

    #[test]
    fn test_rejected_jumps_counted() {
        let track = [at(20.0, 16.0), at(21.0, 16.0), at(400.0, 400.0), at(21.0, 16.0)];
        let (mut uc, _) = use_case(StubReader::new(4), &track, StabilizerConfig::default());
        let report = run(&mut uc).unwrap();
        assert_eq!(report.rejected, 1);
        assert_eq!(report.detected, 4);
    }

    #[test]
    fn test_reader_error_closes_sink_and_propagates() {
        let mut reader = StubReader::new(5);
        reader.fail_at = Some(3);
        let closed = reader.closed.clone();
        let (mut uc, recorded) = use_case(reader, &[at(20.0, 16.0)], StabilizerConfig::default());

        let err = run(&mut uc).unwrap_err();

        assert!(err.to_string().contains("camera unplugged"));
        let rec = recorded.lock().unwrap();
        assert_eq!(rec.frames.len(), 3);
        assert!(rec.closed);
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_empty_input_is_error_and_sink_untouched() {
        let (mut uc, recorded) = use_case(StubReader::new(0), &[], StabilizerConfig::default());
        assert!(run(&mut uc).is_err());
        let rec = recorded.lock().unwrap();
        assert!(rec.opened.is_none());
        assert!(!rec.closed);
    }

    #[test]
    fn test_detector_failure_is_a_miss() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut uc = StabilizeVideoUseCase::new(
            Box::new(StubReader::new(3)),
            Box::new(StubWriter {
                recorded: recorded.clone(),
            }),
            Box::new(FailingDetector),
            stabilizer(StabilizerConfig::default()),
            Box::new(NullPipelineLogger),
        );

        let report = run(&mut uc).unwrap();
        assert_eq!(report.lost, 3);
        assert_eq!(recorded.lock().unwrap().frames[2], frame(2));
    }

    #[test]
    fn test_max_frames_bounds_live_source() {
        let (uc, recorded) = use_case(StubReader::live(50), &[], StabilizerConfig::default());
        let seen_total = Arc::new(AtomicUsize::new(usize::MAX));
        let seen = seen_total.clone();
        let mut uc = uc.with_max_frames(7).with_progress(Box::new(move |_: usize, total: usize| {
            seen.store(total, Ordering::Relaxed);
            true
        }));

        let report = run(&mut uc).unwrap();
        assert_eq!(report.frames, 7);
        assert!(!report.cancelled);
        assert_eq!(recorded.lock().unwrap().frames.len(), 7);
        assert_eq!(seen_total.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_progress_callback_stops_session() {
        let (uc, recorded) = use_case(StubReader::new(10), &[], StabilizerConfig::default());
        let mut uc = uc.with_progress(Box::new(|done: usize, _: usize| done < 4));

        let report = run(&mut uc).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.frames, 4);
        let rec = recorded.lock().unwrap();
        assert_eq!(rec.frames.len(), 4);
        assert!(rec.closed);
    }

    #[test]
    fn test_cancel_flag_before_start_writes_nothing() {
        let (uc, recorded) = use_case(StubReader::new(10), &[], StabilizerConfig::default());
        let flag = Arc::new(AtomicBool::new(true));
        let mut uc = uc.with_cancel_flag(flag.clone());
        assert!(Arc::ptr_eq(&uc.cancel_flag(), &flag));

        let report = run(&mut uc).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.frames, 0);
        assert!(recorded.lock().unwrap().frames.is_empty());
    }
}

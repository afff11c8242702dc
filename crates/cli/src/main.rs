mod settings;

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};

use steadyface_core::detection::domain::landmark_detector::LandmarkDetector;
use steadyface_core::detection::infrastructure::onnx_landmark_detector::OnnxLandmarkDetector;
use steadyface_core::detection::infrastructure::scripted_landmark_detector::ScriptedLandmarkDetector;
use steadyface_core::detection::infrastructure::skip_frame_detector::SkipFrameDetector;
use steadyface_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use steadyface_core::pipeline::stabilize_video_use_case::StabilizeVideoUseCase;
use steadyface_core::shared::constants::{YOLO_MODEL_NAME, YOLO_MODEL_URL};
use steadyface_core::shared::model_resolver;
use steadyface_core::stabilization::domain::frame_warper::EdgeFill;
use steadyface_core::stabilization::domain::stabilizer::Stabilizer;
use steadyface_core::stabilization::domain::stabilizer_config::{LossPolicy, TargetPolicy};
use steadyface_core::stabilization::infrastructure::translation_warper::TranslationWarper;
use steadyface_core::video::domain::video_reader::VideoReader;
use steadyface_core::video::domain::video_writer::VideoWriter;
use steadyface_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use steadyface_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use steadyface_core::video::infrastructure::image_sequence_writer::ImageSequenceWriter;

use settings::Settings;

/// Keeps a face steady in a video by tracking the eyes and shifting each frame.
#[derive(Parser)]
#[command(name = "steadyface", version)]
struct Cli {
    /// Input video file, or a capture device (e.g. /dev/video0) with --capture-format.
    input: PathBuf,

    /// Output video file, or a directory with --image-sequence.
    output: PathBuf,

    /// Write numbered PNG frames instead of a video.
    #[arg(long)]
    image_sequence: bool,

    /// ffmpeg input format for live capture: v4l2, avfoundation, dshow.
    #[arg(long)]
    capture_format: Option<String>,

    /// Anchors averaged for smoothing (higher = steadier, slower to follow).
    #[arg(long)]
    history: Option<usize>,

    /// Largest per-frame eye movement in pixels accepted as real motion.
    #[arg(long)]
    max_jump: Option<f64>,

    /// Pin the eyes to a fixed point, as fractions of width and height (e.g. 0.5,0.4).
    #[arg(long, value_parser = parse_target)]
    target: Option<(f64, f64)>,

    /// Output for frames where no face is found.
    #[arg(long, value_enum)]
    on_loss: Option<OnLoss>,

    /// How uncovered borders are filled.
    #[arg(long, value_enum)]
    edge_fill: Option<EdgeFillArg>,

    /// Frames without a face before tracking restarts (0 = never restart).
    #[arg(long)]
    grace_frames: Option<usize>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Run detection every Nth frame (1 = every frame).
    #[arg(long)]
    skip_frames: Option<usize>,

    /// Encode at this size instead of the input size, e.g. 1280x720.
    #[arg(long, value_parser = parse_size)]
    output_size: Option<(u32, u32)>,

    /// CRF quality (0 = lossless, 51 = worst).
    #[arg(long)]
    quality: Option<u8>,

    /// Stop after this many frames (required to end a live capture).
    #[arg(long)]
    max_frames: Option<usize>,

    /// Replay anchors from a JSON track instead of running the face model.
    #[arg(long)]
    anchors: Option<PathBuf>,

    /// Use this ONNX model instead of the downloaded one.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Settings file (default: platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the settings file.
    #[arg(long)]
    save_config: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OnLoss {
    /// Show the unstabilized frame.
    Raw,
    /// Freeze the last stabilized frame.
    LastGood,
    /// Keep applying the last shift to the live frame.
    LastShift,
}

impl From<OnLoss> for LossPolicy {
    fn from(value: OnLoss) -> Self {
        match value {
            OnLoss::Raw => LossPolicy::PassthroughRaw,
            OnLoss::LastGood => LossPolicy::ReuseLastGood,
            OnLoss::LastShift => LossPolicy::ReuseLastTransform,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EdgeFillArg {
    Black,
    Replicate,
}

impl From<EdgeFillArg> for EdgeFill {
    fn from(value: EdgeFillArg) -> Self {
        match value {
            EdgeFillArg::Black => EdgeFill::Black,
            EdgeFillArg::Replicate => EdgeFill::Replicate,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings_path = cli
        .config
        .clone()
        .or_else(Settings::default_path)
        .ok_or("No config directory on this platform; pass --config")?;
    let settings = apply_overrides(&cli, Settings::load(&settings_path)?);
    validate(&cli, &settings)?;

    if cli.save_config {
        settings.save(&settings_path)?;
        log::info!("Settings saved to {}", settings_path.display());
    }

    let reader: Box<dyn VideoReader> = match settings.capture_format.as_deref() {
        Some(format) => Box::new(FfmpegReader::device(format)),
        None => Box::new(FfmpegReader::new()),
    };
    let writer = build_writer(cli.image_sequence, &settings);
    let detector = build_detector(&cli, &settings)?;
    let warper = TranslationWarper::new(settings.stabilizer.edge_fill);
    let stabilizer = Stabilizer::new(settings.stabilizer.clone(), Box::new(warper))?;

    let mut use_case = StabilizeVideoUseCase::new(
        reader,
        writer,
        detector,
        stabilizer,
        Box::new(StdoutPipelineLogger::default()),
    );
    if let Some(n) = cli.max_frames {
        use_case = use_case.with_max_frames(n);
    }

    let report = use_case.execute(&cli.input, &cli.output)?;
    log::info!(
        "Stabilized {} frames ({} with a face, {} jumps rejected, {} re-acquired) -> {}",
        report.frames,
        report.detected,
        report.rejected,
        report.reacquired,
        cli.output.display()
    );
    Ok(())
}

/// Command-line flags win over the settings file.
fn apply_overrides(cli: &Cli, mut settings: Settings) -> Settings {
    let stab = &mut settings.stabilizer;
    if let Some(k) = cli.history {
        stab.history_capacity = k;
    }
    if let Some(px) = cli.max_jump {
        stab.max_movement_threshold = px;
    }
    if let Some((x, y)) = cli.target {
        stab.target_policy = TargetPolicy::FixedNormalizedPosition;
        stab.target_x = x;
        stab.target_y = y;
    }
    if let Some(on_loss) = cli.on_loss {
        stab.loss_policy = on_loss.into();
    }
    if let Some(fill) = cli.edge_fill {
        stab.edge_fill = fill.into();
    }
    if let Some(grace) = cli.grace_frames {
        stab.loss_grace_frames = (grace > 0).then_some(grace);
    }

    if let Some(c) = cli.confidence {
        settings.confidence = c;
    }
    if let Some(n) = cli.skip_frames {
        settings.skip_frames = n;
    }
    if let Some((w, h)) = cli.output_size {
        settings.output_width = Some(w);
        settings.output_height = Some(h);
    }
    if let Some(q) = cli.quality {
        settings.quality = Some(q);
    }
    if let Some(format) = &cli.capture_format {
        settings.capture_format = Some(format.clone());
    }
    if let Some(model) = &cli.model {
        settings.model_path = Some(model.clone());
    }
    settings
}

fn validate(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if settings.capture_format.is_none() && !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if settings.capture_format.is_some() && cli.max_frames.is_none() {
        log::warn!("Live capture without --max-frames runs until the device stops");
    }
    if let Some(anchors) = &cli.anchors {
        if !anchors.exists() {
            return Err(format!("Anchor track not found: {}", anchors.display()).into());
        }
    }
    if !(0.0..=1.0).contains(&settings.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            settings.confidence
        )
        .into());
    }
    if settings.skip_frames == 0 {
        return Err("Skip frames must be at least 1".into());
    }
    if let Some(q) = settings.quality {
        if q > 51 {
            return Err(format!("Quality must be between 0 and 51, got {q}").into());
        }
    }
    if let Some((w, h)) = settings.output_size() {
        if w == 0 || h == 0 {
            return Err(format!("Output size must be non-zero, got {w}x{h}").into());
        }
    }
    if cli.max_frames == Some(0) {
        return Err("Max frames must be at least 1".into());
    }
    settings.stabilizer.validate()?;
    Ok(())
}

fn build_writer(image_sequence: bool, settings: &Settings) -> Box<dyn VideoWriter> {
    let size = settings.output_size();
    if image_sequence {
        let writer = ImageSequenceWriter::new();
        return Box::new(match size {
            Some((w, h)) => writer.with_output_size(w, h),
            None => writer,
        });
    }

    let mut writer = FfmpegWriter::new();
    if let Some((w, h)) = size {
        writer = writer.with_output_size(w, h);
    }
    if let Some(crf) = settings.quality {
        writer = writer.with_quality(crf);
    }
    Box::new(writer)
}

fn build_detector(
    cli: &Cli,
    settings: &Settings,
) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
    let base: Box<dyn LandmarkDetector> = match &cli.anchors {
        Some(track) => {
            let scripted = ScriptedLandmarkDetector::from_file(track)?;
            log::info!("Replaying {} anchors from {}", scripted.len(), track.display());
            return Ok(Box::new(scripted));
        }
        None => {
            log::info!("Resolving model: {YOLO_MODEL_NAME}");
            let model_path = model_resolver::resolve(
                YOLO_MODEL_NAME,
                YOLO_MODEL_URL,
                settings.model_path.as_deref(),
                Some(Box::new(download_progress)),
            )?;
            Box::new(OnnxLandmarkDetector::new(&model_path, settings.confidence)?)
        }
    };

    if settings.skip_frames > 1 {
        Ok(Box::new(SkipFrameDetector::new(base, settings.skip_frames)?))
    } else {
        Ok(base)
    }
}

fn parse_target(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate '{v}': {e}"))
    };
    Ok((parse(x)?, parse(y)?))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid dimension '{v}': {e}"))
    };
    Ok((parse(w)?, parse(h)?))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face landmark model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face landmark model... {downloaded} bytes");
    }
}

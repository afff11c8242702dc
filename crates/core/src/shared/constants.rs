pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Anchors kept for the moving average (~1 second at 30 fps).
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Largest per-frame anchor movement, in pixels, accepted as genuine motion.
pub const DEFAULT_MAX_MOVEMENT: f64 = 100.0;

/// Frames without a face before the tracking epoch is discarded.
pub const DEFAULT_LOSS_GRACE_FRAMES: usize = 30;

/// Consecutive rejected jumps after which the new position is trusted.
pub const DEFAULT_REACQUIRE_AFTER_REJECTIONS: usize = 15;

/// Frame rate assumed when a source does not report one.
pub const FALLBACK_FPS: f64 = 30.0;

pub const APP_DIR_NAME: &str = "SteadyFace";

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use steadyface_core::detection::infrastructure::onnx_landmark_detector::DEFAULT_CONFIDENCE;
use steadyface_core::shared::constants::APP_DIR_NAME;
use steadyface_core::stabilization::domain::stabilizer_config::StabilizerConfig;

/// Persisted defaults for the command line. Every field is optional in the
/// file; absent keys take the built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub stabilizer: StabilizerConfig,
    /// Face box confidence threshold, 0.0-1.0.
    pub confidence: f64,
    /// Run the landmark model every Nth frame.
    pub skip_frames: usize,
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,
    /// CRF, 0-51.
    pub quality: Option<u8>,
    /// ffmpeg input format for capture devices (`v4l2`, `avfoundation`, `dshow`).
    pub capture_format: Option<String>,
    pub model_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stabilizer: StabilizerConfig::default(),
            confidence: DEFAULT_CONFIDENCE,
            skip_frames: 1,
            output_width: None,
            output_height: None,
            quality: None,
            capture_format: None,
            model_path: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// A missing file yields defaults; a malformed one is an error so a typo
    /// never silently reverts every option.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| format!("Invalid settings file {}: {e}", path.display()).into()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn output_size(&self) -> Option<(u32, u32)> {
        self.output_width.zip(self.output_height)
    }
}

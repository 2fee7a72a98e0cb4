//! # Pipeline Configuration
//!
//! Every knob of the capture-and-persist pipeline lives in [`PipelineConfig`] and is handed to
//! [`crate::init`] and the session builder explicitly. The library never reads ambient state.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `mode` | `CaptureMode` | `full` | Which variant is persisted: full frame, resized or cropped |
//! | `resize_factor` | `f64` | `4.0` | Divisor applied to the frame size (resized) or shorter side (cropped) |
//! | `pixel_format` | `PixelFormat` | `argb` | Layout requested from the resizer |
//! | `element_type` | `ElementType` | `uint8` | Channel type requested from the resizer |
//! | `format_policy` | `FormatPolicy` | `strict` | Whether non-argb/uint8 buffers are rejected |
//! | `target_fps` | `Option<f64>` | none | Run the pipeline at most this often; `None` runs every frame |
//! | `orientation` | `FormatOrientation` | `as_reported` | `portrait` rotates landscape frames to portrait before geometry |
//! | `write_header` | `bool` | `true` | Prefix each file with the 16-byte layout header |
//! | `directory` | `Option<PathBuf>` | `<temp>/frame-to-file` | Managed output directory |
//! | `path_channel_capacity` | `usize` | `4` | Capacity of the path hand-off channel |
//!
//! ## Examples
//!
//! ```rust
//! use frame_to_file::config::config::PipelineConfig;
//! use frame_to_file::processing::processing::CaptureMode;
//!
//! let config = PipelineConfig {
//!     mode: CaptureMode::Cropped,
//!     target_fps: Some(2.0),
//!     ..PipelineConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use frame_scale::geometry::Dimension;
use frame_scale::pixel::{ElementType, PixelFormat};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, FrameResult};
use crate::processing::processing::CaptureMode;
use crate::processing::variant::FormatPolicy;

/// Name of the managed directory under the system temp dir.
pub const DEFAULT_DIRECTORY_NAME: &str = "frame-to-file";

/// How the camera's reported format relates to the frames the app wants.
///
/// Camera APIs report the format, and deliver frames, in landscape even when the app is held
/// in portrait.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FormatOrientation {
    /// Use frames exactly as delivered.
    #[default]
    AsReported,
    /// The app is held in portrait: landscape frames are turned a quarter clockwise and all
    /// geometry is computed on the swapped width/height.
    Portrait,
}

impl FormatOrientation {
    /// Display-oriented size of a `frame` of the given size, and whether its buffer has to be
    /// rotated to get there. Frames that are already portrait are left alone.
    pub fn orient(self, frame: Dimension) -> (Dimension, bool) {
        match self {
            FormatOrientation::Portrait if frame.width > frame.height => (frame.swapped(), true),
            _ => (frame, false),
        }
    }
}

/// Configuration for one capture-and-persist pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: CaptureMode,
    pub resize_factor: f64,
    pub pixel_format: PixelFormat,
    pub element_type: ElementType,
    pub format_policy: FormatPolicy,
    pub target_fps: Option<f64>,
    pub orientation: FormatOrientation,
    pub write_header: bool,
    pub directory: Option<PathBuf>,
    pub path_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Full,
            resize_factor: 4.0,
            pixel_format: PixelFormat::Argb,
            element_type: ElementType::Uint8,
            format_policy: FormatPolicy::Strict,
            target_fps: None,
            orientation: FormatOrientation::AsReported,
            write_header: true,
            directory: None,
            path_channel_capacity: 4,
        }
    }
}

impl PipelineConfig {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Load and validate a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> FrameResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FrameError::io_at("read config", path, e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| FrameError::from(e).with_context(format!("parsing {}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// The managed directory frames are persisted into.
    pub fn managed_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DIRECTORY_NAME))
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> FrameResult<()> {
        if !self.resize_factor.is_finite() || self.resize_factor < 1.0 {
            return Err(FrameError::config(
                "resize_factor",
                self.resize_factor.to_string(),
                "must be a finite value >= 1",
            ));
        }
        if let Some(fps) = self.target_fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(FrameError::config(
                    "target_fps",
                    fps.to_string(),
                    "must be a finite value > 0",
                ));
            }
        }
        if self.path_channel_capacity == 0 {
            return Err(FrameError::config(
                "path_channel_capacity",
                "0",
                "must be at least 1",
            ));
        }
        // Full mode persists the camera frame itself, so the requested layout is unused.
        if self.mode != CaptureMode::Full
            && self.format_policy == FormatPolicy::Strict
            && !(self.pixel_format == PixelFormat::Argb && self.element_type == ElementType::Uint8)
        {
            return Err(FrameError::config(
                "pixel_format",
                format!("{}/{}", self.pixel_format, self.element_type),
                "strict format policy only accepts argb/uint8; use the passthrough policy",
            ));
        }
        Ok(())
    }
}

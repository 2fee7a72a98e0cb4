//! # Frame-to-File Capture Pipeline
//!
//! Takes raw camera frames, optionally crops or scales them, and persists the chosen buffer to
//! a uniquely named file in a managed directory, reporting resize and write timing separately.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `processing`: variant selection and the full / resized / cropped strategies
//! - `persist`: the frame persister state machine and the raw container format
//! - `session`: the dedicated processing thread, frame intake and path hand-off
//! - `core`: buffer pool and run-at-target-fps throttle
//! - `capture`: the camera seam and a synthetic camera
//! - `config`: explicit pipeline configuration
//! - `error`: the pipeline error type and its classification
//!
//! Crop/scale geometry and the CPU resizer live in the `frame_scale` crate.
//!
//! ## Initialization
//!
//! [`init`] validates the configuration, creates the managed directory and runs the start-up
//! clear. It fails at start-up instead of on the first frame.
//!
//! ## Example
//!
//! ```rust,no_run
//! use frame_to_file::{init, config::PipelineConfig};
//! use frame_to_file::processing::{select_variant, CameraFrame, FormatPolicy};
//!
//! # fn example() -> Result<(), frame_to_file::FrameError> {
//! let persister = init(&PipelineConfig::default())?;
//! let frame = CameraFrame::from_argb(0, 2, 2, vec![0xff; 16])?;
//! let variant = select_variant(frame, None, None, FormatPolicy::Strict)?;
//! let result = persister.persist(&variant)?;
//! println!("{} written in {}ms", result.path.display(), result.write_duration_ms);
//! # Ok(())
//! # }
//! ```

use tracing::info;

pub mod capture;
pub mod config;
pub mod core;
pub mod error;
pub mod persist;
pub mod processing;
pub mod session;

/// Re-export error types for convenience
pub use error::{FrameError, FrameResult, HasRecoverySuggestion, HasSeverity, Retryable};

/// Re-export the geometry/resize crate
pub use frame_scale;

pub use config::PipelineConfig;
pub use persist::{FramePersister, PersistResult};
pub use session::{AppState, FrameSession};

/// Validate `config`, create the managed directory and clear it.
///
/// Returns a `Ready` persister.
///
/// # Errors
/// `Config` for an invalid configuration, `Initialization` if the directory cannot be created.
pub fn init(config: &PipelineConfig) -> FrameResult<FramePersister> {
    config.validate()?;
    let persister = FramePersister::new(config.managed_directory(), config.write_header);
    let report = persister.initialize()?;
    info!(
        dir = %persister.directory().display(),
        cleared = report.deleted,
        failed = report.failures.len(),
        "frame persister ready"
    );
    Ok(persister)
}

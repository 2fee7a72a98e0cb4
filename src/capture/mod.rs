//! # Capture Module
//!
//! The camera side of the pipeline. Real devices live outside this crate; they plug in by
//! implementing [`CaptureSource`].

pub mod synthetic;

use frame_scale::geometry::Dimension;

use crate::error::FrameResult;
use crate::processing::variant::CameraFrame;

pub use synthetic::SyntheticCamera;

/// A camera delivering ARGB8 frames at device-reported dimensions.
pub trait CaptureSource: Send {
    /// Format as reported by the device, in landscape regardless of how the app is held.
    /// Queried once per format selection, not per frame.
    fn reported_format(&self) -> Dimension;

    /// The next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> FrameResult<Option<CameraFrame>>;
}

//! # Processing Module
//!
//! Per-frame processing: variant selection and the capture-mode strategies built on it.

pub mod processing;
pub mod variant;

// Re-export commonly used types for convenience
pub use processing::{strategy_for, CaptureMode, ResizeGeometry, ResizingStrategy, VariantStrategy};
pub use variant::{select_variant, CameraFrame, FormatPolicy, FrameVariant, ResizedBuffer, SourceFrameRef};

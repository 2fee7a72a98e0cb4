// SPDX-License-Identifier: MIT
//! # frame-scale: Crop/Scale Geometry and Resize for Camera Frames
//!
//! This crate holds the pure, I/O-free half of the frame-to-file pipeline: deciding which
//! rectangle of a camera frame to keep and at what size, plus a CPU implementation of the
//! resize/crop collaborator that turns that decision into a raw pixel buffer.
//!
//! ## Key Components
//!
//! - [`geometry`]: `Dimension`, `Point`, `Rectangle` and the centered crop resolvers
//! - [`pixel`]: pixel format / element type metadata and the `PixelBuffer` that carries it
//! - [`cpu`]: the `FrameResizer` seam and a SIMD-accelerated `CpuResizer`
//!
//! ## Rounding
//!
//! Every place that turns a fractional coordinate into a pixel coordinate uses
//! round-half-away-from-zero ([`geometry::round_half_away`]). Crop rectangles are therefore
//! identical across frames of a session for identical inputs.
//!
//! ## Usage Example
//!
//! ```rust
//! use frame_scale::geometry::{centered_square, Dimension};
//!
//! let frame = Dimension::new(400.0, 300.0)?;
//! let rect = centered_square(100.0, frame)?;
//! assert_eq!((rect.x, rect.y, rect.width, rect.height), (150.0, 100.0, 100.0, 100.0));
//! # Ok::<(), frame_scale::ScaleError>(())
//! ```

pub mod cpu;
pub mod error;
pub mod geometry;
pub mod pixel;

pub use error::ScaleError;

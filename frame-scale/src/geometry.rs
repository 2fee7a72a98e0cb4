// SPDX-License-Identifier: MIT
//! # Crop and Scale Geometry
//!
//! This module computes the rectangles handed to the resize collaborator. Everything here is
//! a pure function of its inputs: no I/O, no clocks, no hidden state, so the same frame format
//! always yields the same crop.
//!
//! ## Design
//!
//! - **Dimension**: a finite, strictly positive width/height pair
//! - **Rectangle**: an origin plus a dimension, expressed in source-frame pixels
//! - **Resolvers**: [`centered_rectangle`] and [`centered_square`] place a size at the center
//!   of a frame; [`scaled_by_factor`] shrinks a frame by a resize factor
//!
//! ## Rounding Rule
//!
//! Origins are rounded with [`round_half_away`] (half-away-from-zero, i.e. `f64::round`).
//! With `size <= frame` on both axes the rounded origin can never push the rectangle outside
//! the frame, and its center stays within half a pixel of the frame center.
//!
//! ## Orientation
//!
//! Camera APIs report the format in landscape even when the host displays portrait. These
//! resolvers never swap axes themselves: callers that want portrait geometry must pass
//! [`Dimension::swapped`] of the reported format.

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;

/// A width/height pair in pixels. Always finite and strictly positive once validated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub width: f64,
    pub height: f64,
}

/// A point in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned rectangle in source-frame pixel coordinates.
///
/// Produced by the resolvers in this module; `x + width <= frame.width` and
/// `y + height <= frame.height` hold for the frame it was computed against.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimension {
    /// Create a validated dimension.
    ///
    /// # Errors
    /// `ScaleError::InvalidDimension` when either side is zero, negative, NaN or infinite.
    pub fn new(width: f64, height: f64) -> Result<Self, ScaleError> {
        let d = Self { width, height };
        d.validate("dimension")?;
        Ok(d)
    }

    /// Dimension of a frame whose size is already known in whole pixels.
    ///
    /// Zero-sized frames are not representable as a valid `Dimension`; the resolvers reject
    /// them when they are passed in.
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
        }
    }

    /// Same dimension with width and height exchanged (landscape ↔ portrait).
    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn min_side(self) -> f64 {
        self.width.min(self.height)
    }

    pub fn center(self) -> Point {
        Point {
            x: self.width / 2.0,
            y: self.height / 2.0,
        }
    }

    /// Whole-pixel size of this dimension, rounded half-away-from-zero and clamped to 1px.
    pub fn to_pixels(self) -> (u32, u32) {
        (
            (round_half_away(self.width) as u32).max(1),
            (round_half_away(self.height) as u32).max(1),
        )
    }

    pub(crate) fn validate(self, what: &'static str) -> Result<(), ScaleError> {
        check_positive(what, "width", self.width)?;
        check_positive(what, "height", self.height)
    }
}

impl Rectangle {
    pub fn origin(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    pub fn size(&self) -> Dimension {
        Dimension {
            width: self.width,
            height: self.height,
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// True if the rectangle lies entirely inside `frame` (origin at `(0, 0)`).
    pub fn fits_within(&self, frame: Dimension) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= frame.width
            && self.y + self.height <= frame.height
    }
}

/// The rounding rule used for every fractional → whole pixel conversion in this crate.
///
/// Half-way cases round away from zero: `149.5 → 150`, `-0.5 → -1`.
#[inline]
pub fn round_half_away(v: f64) -> f64 {
    v.round()
}

/// Place `size` at the center of `frame`.
///
/// `origin = round(frame / 2 - size / 2)` component-wise; the rectangle keeps `size` exactly.
///
/// # Errors
/// `ScaleError::InvalidDimension` when either input is non-positive or non-finite, or when
/// `size` exceeds `frame` on either axis (the rectangle would leave the frame).
pub fn centered_rectangle(size: Dimension, frame: Dimension) -> Result<Rectangle, ScaleError> {
    size.validate("size")?;
    frame.validate("frame")?;
    if size.width > frame.width || size.height > frame.height {
        return Err(ScaleError::invalid(
            "size",
            format!(
                "{}x{} does not fit inside frame {}x{}",
                size.width, size.height, frame.width, frame.height
            ),
        ));
    }

    let center = frame.center();
    let rect = Rectangle {
        x: round_half_away(center.x - size.width / 2.0),
        y: round_half_away(center.y - size.height / 2.0),
        width: size.width,
        height: size.height,
    };
    debug_assert!(rect.x >= 0.0 && rect.y >= 0.0);
    Ok(rect)
}

/// Centered square of `side` pixels. Equivalent to `centered_rectangle((side, side), frame)`.
pub fn centered_square(side: f64, frame: Dimension) -> Result<Rectangle, ScaleError> {
    check_positive("side", "length", side)?;
    centered_rectangle(
        Dimension {
            width: side,
            height: side,
        },
        frame,
    )
}

/// Shrink `frame` by `factor`, returning whole-pixel output dimensions.
///
/// `factor = 4` turns a 1920x1080 frame into 480x270. Each side is rounded half-away-from-zero
/// and never drops below one pixel.
pub fn scaled_by_factor(frame: Dimension, factor: f64) -> Result<Dimension, ScaleError> {
    frame.validate("frame")?;
    check_factor(factor)?;
    let (w, h) = Dimension {
        width: frame.width / factor,
        height: frame.height / factor,
    }
    .to_pixels();
    Ok(Dimension::from_pixels(w, h))
}

/// Centered crop square whose side is `min(frame.width, frame.height) / factor`.
///
/// This is the crop used by the cropped capture mode; the side is kept fractional so the
/// geometry matches the format exactly, the resizer rounds it when sizing its output.
pub fn crop_square_for(frame: Dimension, factor: f64) -> Result<Rectangle, ScaleError> {
    frame.validate("frame")?;
    check_factor(factor)?;
    centered_square(frame.min_side() / factor, frame)
}

fn check_positive(what: &'static str, axis: &str, v: f64) -> Result<(), ScaleError> {
    if !v.is_finite() {
        return Err(ScaleError::invalid(what, format!("{} is not finite ({})", axis, v)));
    }
    if v <= 0.0 {
        return Err(ScaleError::invalid(what, format!("{} must be positive, got {}", axis, v)));
    }
    Ok(())
}

fn check_factor(factor: f64) -> Result<(), ScaleError> {
    if !factor.is_finite() || factor < 1.0 {
        return Err(ScaleError::invalid(
            "resize factor",
            format!("must be a finite value >= 1, got {}", factor),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn centered_square_in_landscape_frame() {
        let frame = Dimension::new(400.0, 300.0).unwrap();
        let rect = centered_square(100.0, frame).unwrap();
        assert_eq!(
            rect,
            Rectangle {
                x: 150.0,
                y: 100.0,
                width: 100.0,
                height: 100.0
            }
        );
    }

    #[test]
    fn half_pixel_origin_rounds_away_from_zero() {
        // 200 - 50.5 = 149.5 and 150 - 50.5 = 99.5
        let frame = Dimension::new(400.0, 300.0).unwrap();
        let rect = centered_square(101.0, frame).unwrap();
        assert_eq!((rect.x, rect.y), (150.0, 100.0));
        assert_eq!(round_half_away(-0.5), -1.0);
        assert_eq!(round_half_away(2.5), 3.0);
    }

    #[test]
    fn centered_rectangle_keeps_requested_size() {
        let frame = Dimension::new(1920.0, 1080.0).unwrap();
        let size = Dimension::new(640.0, 360.0).unwrap();
        let rect = centered_rectangle(size, frame).unwrap();
        assert_eq!(rect.size(), size);
        assert_eq!(rect.origin(), Point { x: 640.0, y: 360.0 });
        assert!(rect.fits_within(frame));
    }

    #[test]
    fn full_frame_square_sits_at_origin() {
        let frame = Dimension::new(300.0, 300.0).unwrap();
        let rect = centered_square(300.0, frame).unwrap();
        assert_eq!(rect.origin(), Point { x: 0.0, y: 0.0 });
    }

    #[test]
    fn rejects_non_positive_and_non_finite_inputs() {
        let frame = Dimension::from_pixels(400, 300);
        assert!(matches!(
            centered_square(0.0, frame),
            Err(ScaleError::InvalidDimension { what: "side", .. })
        ));
        assert!(centered_square(-5.0, frame).is_err());
        assert!(centered_square(f64::NAN, frame).is_err());
        assert!(centered_square(10.0, Dimension::from_pixels(0, 300)).is_err());
        assert!(centered_square(10.0, Dimension::from_pixels(400, 0)).is_err());
        assert!(Dimension::new(f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn rejects_size_larger_than_frame() {
        let frame = Dimension::from_pixels(400, 300);
        assert!(matches!(
            centered_square(301.0, frame),
            Err(ScaleError::InvalidDimension { what: "size", .. })
        ));
    }

    #[test]
    fn swapped_dimension_exchanges_axes() {
        let landscape = Dimension::from_pixels(1920, 1080);
        assert_eq!(landscape.swapped(), Dimension::from_pixels(1080, 1920));
    }

    #[test]
    fn scaled_by_factor_rounds_and_clamps() {
        let out = scaled_by_factor(Dimension::from_pixels(1920, 1080), 4.0).unwrap();
        assert_eq!(out.to_pixels(), (480, 270));

        let odd = scaled_by_factor(Dimension::from_pixels(1922, 1082), 4.0).unwrap();
        // 480.5 → 481, 270.5 → 271
        assert_eq!(odd.to_pixels(), (481, 271));

        let tiny = scaled_by_factor(Dimension::from_pixels(3, 3), 8.0).unwrap();
        assert_eq!(tiny.to_pixels(), (1, 1));

        assert!(scaled_by_factor(Dimension::from_pixels(100, 100), 0.5).is_err());
    }

    #[test]
    fn crop_square_uses_shorter_side() {
        let rect = crop_square_for(Dimension::from_pixels(1920, 1080), 4.0).unwrap();
        assert_eq!(rect.width, 270.0);
        assert_eq!(rect.height, 270.0);
        assert_eq!(rect.origin(), Point { x: 825.0, y: 405.0 });
    }

    proptest! {
        #[test]
        fn prop_centered_square_is_contained_and_centered(
            w in 1.0f64..8000.0,
            h in 1.0f64..8000.0,
            frac in 0.001f64..=1.0,
        ) {
            let frame = Dimension::new(w, h).unwrap();
            let side = frame.min_side() * frac;
            let rect = centered_square(side, frame).unwrap();

            prop_assert!(rect.x >= 0.0 && rect.y >= 0.0);
            prop_assert!(rect.x + rect.width <= frame.width + 1e-9);
            prop_assert!(rect.y + rect.height <= frame.height + 1e-9);

            let (c, fc) = (rect.center(), frame.center());
            prop_assert!((c.x - fc.x).abs() < 1.0);
            prop_assert!((c.y - fc.y).abs() < 1.0);
        }

        #[test]
        fn prop_centered_rectangle_is_deterministic(
            w in 1.0f64..8000.0,
            h in 1.0f64..8000.0,
            fw in 0.01f64..=1.0,
            fh in 0.01f64..=1.0,
        ) {
            let frame = Dimension::new(w, h).unwrap();
            let size = Dimension::new(w * fw, h * fh).unwrap();
            let first = centered_rectangle(size, frame).unwrap();
            let second = centered_rectangle(size, frame).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}

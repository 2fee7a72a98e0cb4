// SPDX-License-Identifier: MIT
// Errors shared by the geometry resolver, buffer metadata checks and the CPU resizer.

use fast_image_resize as fir;

use crate::pixel::{ElementType, PixelFormat};

#[derive(Debug)]
pub enum ScaleError {
    /// A size, side or frame dimension that is non-finite, zero, negative or too large.
    InvalidDimension { what: &'static str, reason: String },
    /// Declared metadata does not describe the number of bytes supplied.
    BufferMismatch { expected: usize, actual: usize },
    /// The resizer only reads 4-channel 8-bit ARGB sources.
    UnsupportedSource {
        pixel_format: PixelFormat,
        element_type: ElementType,
    },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl ScaleError {
    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidDimension {
            what,
            reason: reason.into(),
        }
    }
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::InvalidDimension { what, reason } => {
                write!(f, "Invalid {}: {}", what, reason)
            }
            ScaleError::BufferMismatch { expected, actual } => write!(
                f,
                "Buffer holds {} bytes but its metadata describes {} bytes",
                actual, expected
            ),
            ScaleError::UnsupportedSource {
                pixel_format,
                element_type,
            } => write!(
                f,
                "Unsupported source frame layout {}/{} (expected argb/uint8)",
                pixel_format.as_str(),
                element_type.as_str()
            ),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

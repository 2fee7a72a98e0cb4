// SPDX-License-Identifier: MIT
//! # Pixel Layout Metadata
//!
//! Raw frame bytes are meaningless without the layout that produced them: a 120x90 `rgb/uint8`
//! buffer and a 90x40 `argb/uint8` buffer have the same length. [`PixelBuffer`] therefore
//! never exists without its [`BufferMetadata`], and its constructor checks that the two agree.
//!
//! Only `argb` + `uint8` is guaranteed to be understood by every consumer. The other three
//! combinations are produced by the resizer on request and are accepted or rejected by the
//! caller's format policy.

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;

/// Channel layout of a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Four channels, alpha first.
    Argb,
    /// Three channels, no alpha.
    Rgb,
}

/// Storage type of a single channel value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// One byte per channel, 0..=255.
    Uint8,
    /// Little-endian IEEE-754 single per channel, 0.0..=1.0.
    Float32,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Argb => 4,
            PixelFormat::Rgb => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Argb => "argb",
            PixelFormat::Rgb => "rgb",
        }
    }

    /// Stable on-disk code.
    pub fn code(self) -> u8 {
        match self {
            PixelFormat::Argb => 0,
            PixelFormat::Rgb => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PixelFormat::Argb),
            1 => Some(PixelFormat::Rgb),
            _ => None,
        }
    }
}

impl ElementType {
    /// Bytes per channel value.
    pub fn size(self) -> usize {
        match self {
            ElementType::Uint8 => 1,
            ElementType::Float32 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Uint8 => "uint8",
            ElementType::Float32 => "float32",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ElementType::Uint8 => 0,
            ElementType::Float32 => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ElementType::Uint8),
            1 => Some(ElementType::Float32),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to reinterpret a raw buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferMetadata {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub element_type: ElementType,
}

impl BufferMetadata {
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, element_type: ElementType) -> Self {
        Self {
            width,
            height,
            pixel_format,
            element_type,
        }
    }

    /// Camera frames arrive as 4-channel 8-bit ARGB.
    pub fn argb8(width: u32, height: u32) -> Self {
        Self::new(width, height, PixelFormat::Argb, ElementType::Uint8)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.pixel_format.channels() * self.element_type.size()
    }

    /// Byte length a buffer with this metadata must have.
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * self.bytes_per_pixel()
    }

    /// `argb` + `uint8` is the only layout every consumer is required to understand.
    pub fn is_guaranteed_supported(&self) -> bool {
        self.pixel_format == PixelFormat::Argb && self.element_type == ElementType::Uint8
    }
}

/// Raw pixel bytes that always travel with their layout.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    meta: BufferMetadata,
}

impl PixelBuffer {
    /// Pair `data` with `meta`.
    ///
    /// # Errors
    /// `ScaleError::BufferMismatch` if `data.len() != meta.expected_len()`, and
    /// `ScaleError::InvalidDimension` for a zero-sized layout.
    pub fn new(data: Vec<u8>, meta: BufferMetadata) -> Result<Self, ScaleError> {
        if meta.width == 0 || meta.height == 0 {
            return Err(ScaleError::invalid(
                "buffer",
                format!("{}x{} has no pixels", meta.width, meta.height),
            ));
        }
        let expected = meta.expected_len();
        if data.len() != expected {
            return Err(ScaleError::BufferMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, meta })
    }

    pub fn meta(&self) -> &BufferMetadata {
        &self.meta
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Give the bytes back, e.g. to return them to a buffer pool.
    pub fn into_parts(self) -> (Vec<u8>, BufferMetadata) {
        (self.data, self.meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_len_accounts_for_format_and_element() {
        let m = BufferMetadata::new(120, 90, PixelFormat::Argb, ElementType::Uint8);
        assert_eq!(m.expected_len(), 120 * 90 * 4);
        let m = BufferMetadata::new(120, 90, PixelFormat::Rgb, ElementType::Uint8);
        assert_eq!(m.expected_len(), 120 * 90 * 3);
        let m = BufferMetadata::new(120, 90, PixelFormat::Rgb, ElementType::Float32);
        assert_eq!(m.expected_len(), 120 * 90 * 12);
    }

    #[test]
    fn equal_lengths_do_not_imply_equal_layouts() {
        let a = BufferMetadata::new(120, 90, PixelFormat::Rgb, ElementType::Uint8);
        let b = BufferMetadata::new(90, 90, PixelFormat::Argb, ElementType::Uint8);
        assert_eq!(a.expected_len(), b.expected_len());
        assert_ne!(a, b);
    }

    #[test]
    fn only_argb_uint8_is_guaranteed() {
        assert!(BufferMetadata::argb8(1, 1).is_guaranteed_supported());
        assert!(!BufferMetadata::new(1, 1, PixelFormat::Rgb, ElementType::Uint8).is_guaranteed_supported());
        assert!(!BufferMetadata::new(1, 1, PixelFormat::Argb, ElementType::Float32).is_guaranteed_supported());
    }

    #[test]
    fn pixel_buffer_rejects_wrong_length() {
        let err = PixelBuffer::new(vec![0; 10], BufferMetadata::argb8(2, 2)).unwrap_err();
        assert!(matches!(err, ScaleError::BufferMismatch { expected: 16, actual: 10 }));
        assert!(PixelBuffer::new(Vec::new(), BufferMetadata::argb8(0, 4)).is_err());
    }

    #[test]
    fn codes_round_trip() {
        for f in [PixelFormat::Argb, PixelFormat::Rgb] {
            assert_eq!(PixelFormat::from_code(f.code()), Some(f));
        }
        for e in [ElementType::Uint8, ElementType::Float32] {
            assert_eq!(ElementType::from_code(e.code()), Some(e));
        }
        assert_eq!(PixelFormat::from_code(9), None);
    }
}

//! # Variant Selection
//!
//! Decides which buffer of a processed frame gets persisted, and with which metadata.
//!
//! The rule is simple and strict: a resized buffer, when supplied, overrides the original
//! camera frame, and it must come with its full [`BufferMetadata`]. Byte length alone cannot
//! recover width and height once channel count and element size vary, so a resized buffer
//! without metadata is rejected as a programmer error rather than guessed at.
//!
//! ## Format Policy
//!
//! Only `argb` + `uint8` is guaranteed to be readable by every consumer. [`FormatPolicy`]
//! decides what happens to the selected buffer otherwise:
//!
//! - `Strict` (default): fail fast with `UnsupportedFormat`
//! - `Passthrough`: accept any of the four layouts unchecked

use std::time::{Duration, Instant};

use frame_scale::pixel::{BufferMetadata, PixelBuffer};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, FrameResult};

/// What to do with a selected buffer outside `argb/uint8`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FormatPolicy {
    #[default]
    Strict,
    Passthrough,
}

impl FormatPolicy {
    pub fn check(self, meta: &BufferMetadata) -> FrameResult<()> {
        match self {
            FormatPolicy::Strict if !meta.is_guaranteed_supported() => Err(
                FrameError::unsupported_format(meta.pixel_format, meta.element_type),
            ),
            _ => Ok(()),
        }
    }
}

/// One captured camera frame at device-reported dimensions.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    pub sequence: u64,
    pub captured_at: Instant,
    buffer: PixelBuffer,
}

impl CameraFrame {
    pub fn new(sequence: u64, buffer: PixelBuffer) -> Self {
        Self {
            sequence,
            captured_at: Instant::now(),
            buffer,
        }
    }

    /// Wrap raw ARGB8 bytes as delivered by the camera.
    pub fn from_argb(sequence: u64, width: u32, height: u32, data: Vec<u8>) -> FrameResult<Self> {
        let buffer = PixelBuffer::new(data, BufferMetadata::argb8(width, height))?;
        Ok(Self::new(sequence, buffer))
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn source_ref(&self) -> SourceFrameRef {
        SourceFrameRef {
            width: self.buffer.width(),
            height: self.buffer.height(),
            sequence: self.sequence,
        }
    }

    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }
}

/// Identifies the camera frame a resized buffer was produced from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceFrameRef {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
}

/// Output of the resize collaborator before its metadata is attached.
#[derive(Debug)]
pub struct ResizedBuffer {
    pub data: Vec<u8>,
    /// Time the resize collaborator took
    pub elapsed: Duration,
}

/// The buffer chosen for persistence. Exactly one of the two, never both.
#[derive(Debug)]
pub enum FrameVariant {
    Original(PixelBuffer),
    Resized {
        buffer: PixelBuffer,
        source: SourceFrameRef,
        /// Resize plus selection time
        resize_elapsed: Duration,
    },
}

impl FrameVariant {
    pub fn buffer(&self) -> &PixelBuffer {
        match self {
            FrameVariant::Original(buffer) => buffer,
            FrameVariant::Resized { buffer, .. } => buffer,
        }
    }

    pub fn meta(&self) -> &BufferMetadata {
        self.buffer().meta()
    }

    pub fn is_resized(&self) -> bool {
        matches!(self, FrameVariant::Resized { .. })
    }

    /// `None` for the original frame.
    pub fn resize_elapsed(&self) -> Option<Duration> {
        match self {
            FrameVariant::Original(_) => None,
            FrameVariant::Resized { resize_elapsed, .. } => Some(*resize_elapsed),
        }
    }

    pub fn source(&self) -> Option<SourceFrameRef> {
        match self {
            FrameVariant::Original(_) => None,
            FrameVariant::Resized { source, .. } => Some(*source),
        }
    }

    pub fn into_buffer(self) -> PixelBuffer {
        match self {
            FrameVariant::Original(buffer) => buffer,
            FrameVariant::Resized { buffer, .. } => buffer,
        }
    }
}

/// Choose the buffer to persist.
///
/// - no `resized` buffer: `Original(original)`; a stray `resized_meta` is ignored
/// - `resized` without `resized_meta`: `MissingMetadata`
/// - `resized` with metadata: `Resized`, after checking the byte length and `policy`
///
/// `policy` applies to whichever buffer is selected.
pub fn select_variant(
    original: CameraFrame,
    resized: Option<ResizedBuffer>,
    resized_meta: Option<BufferMetadata>,
    policy: FormatPolicy,
) -> FrameResult<FrameVariant> {
    let started = Instant::now();
    let Some(resized) = resized else {
        policy.check(original.buffer().meta())?;
        return Ok(FrameVariant::Original(original.into_buffer()));
    };

    let meta = resized_meta.ok_or_else(|| {
        FrameError::missing_metadata(format!(
            "resized buffer of {} bytes for frame #{} has no width/height/format",
            resized.data.len(),
            original.sequence
        ))
        .with_operation("select_variant")
    })?;
    policy.check(&meta)?;

    let buffer = PixelBuffer::new(resized.data, meta)
        .map_err(|e| FrameError::from(e).with_operation("select_variant"))?;

    Ok(FrameVariant::Resized {
        buffer,
        source: original.source_ref(),
        resize_elapsed: resized.elapsed + started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_scale::pixel::{ElementType, PixelFormat};

    fn camera_frame(w: u32, h: u32) -> CameraFrame {
        CameraFrame::from_argb(7, w, h, vec![0xff; (w * h * 4) as usize]).unwrap()
    }

    fn resized(meta: &BufferMetadata) -> ResizedBuffer {
        ResizedBuffer {
            data: vec![1; meta.expected_len()],
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn no_resized_buffer_selects_original() {
        let variant = select_variant(camera_frame(400, 300), None, None, FormatPolicy::Strict).unwrap();
        assert!(!variant.is_resized());
        assert_eq!(*variant.meta(), BufferMetadata::argb8(400, 300));
        assert_eq!(variant.resize_elapsed(), None);
    }

    #[test]
    fn stray_metadata_without_buffer_still_selects_original() {
        let meta = BufferMetadata::argb8(120, 90);
        let variant = select_variant(camera_frame(400, 300), None, Some(meta), FormatPolicy::Strict).unwrap();
        assert!(matches!(variant, FrameVariant::Original(_)));
    }

    #[test]
    fn resized_buffer_with_metadata_overrides_original() {
        let meta = BufferMetadata::new(120, 90, PixelFormat::Argb, ElementType::Uint8);
        let buf = resized(&meta);
        let variant = select_variant(camera_frame(480, 360), Some(buf), Some(meta), FormatPolicy::Strict).unwrap();

        match &variant {
            FrameVariant::Resized { buffer, source, resize_elapsed } => {
                assert_eq!(*buffer.meta(), meta);
                assert!(buffer.as_bytes().iter().all(|&b| b == 1));
                assert_eq!(*source, SourceFrameRef { width: 480, height: 360, sequence: 7 });
                assert!(*resize_elapsed >= Duration::from_millis(3));
            }
            other => panic!("expected resized variant, got {:?}", other),
        }
    }

    #[test]
    fn resized_buffer_without_metadata_is_rejected() {
        let buf = ResizedBuffer {
            data: vec![0; 64],
            elapsed: Duration::ZERO,
        };
        let err = select_variant(camera_frame(8, 8), Some(buf), None, FormatPolicy::Passthrough).unwrap_err();
        assert!(matches!(err, FrameError::MissingMetadata { .. }));
    }

    #[test]
    fn strict_policy_rejects_non_argb8() {
        let meta = BufferMetadata::new(4, 4, PixelFormat::Rgb, ElementType::Uint8);
        let err = select_variant(camera_frame(8, 8), Some(resized(&meta)), Some(meta), FormatPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            FrameError::UnsupportedFormat {
                pixel_format: PixelFormat::Rgb,
                element_type: ElementType::Uint8,
                ..
            }
        ));
    }

    #[test]
    fn passthrough_policy_accepts_all_layouts() {
        for pixel_format in [PixelFormat::Argb, PixelFormat::Rgb] {
            for element_type in [ElementType::Uint8, ElementType::Float32] {
                let meta = BufferMetadata::new(4, 3, pixel_format, element_type);
                let variant = select_variant(
                    camera_frame(8, 8),
                    Some(resized(&meta)),
                    Some(meta),
                    FormatPolicy::Passthrough,
                )
                .unwrap();
                assert_eq!(*variant.meta(), meta);
            }
        }
    }

    #[test]
    fn length_mismatch_is_reported() {
        let meta = BufferMetadata::argb8(10, 10);
        let buf = ResizedBuffer {
            data: vec![0; 300],
            elapsed: Duration::ZERO,
        };
        let err = select_variant(camera_frame(20, 20), Some(buf), Some(meta), FormatPolicy::Strict).unwrap_err();
        assert!(matches!(err, FrameError::BufferMismatch { expected: 400, actual: 300, .. }));
    }
}

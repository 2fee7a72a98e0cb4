//! Deterministic ARGB8 frame source for the demo binary and tests.

use frame_scale::geometry::Dimension;

use crate::capture::CaptureSource;
use crate::error::{FrameError, FrameResult};
use crate::processing::variant::CameraFrame;

/// Produces gradient frames of a fixed size. Frame `n` shifts the gradient by `n` pixels so
/// consecutive files differ.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    sequence: u64,
    limit: Option<u64>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> FrameResult<Self> {
        if width == 0 || height == 0 {
            return Err(FrameError::invalid_dimension(
                "camera format",
                format!("{}x{} has no pixels", width, height),
            ));
        }
        Ok(Self {
            width,
            height,
            sequence: 0,
            limit: None,
        })
    }

    /// Stop after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// ARGB8 gradient for frame `sequence`: red along x, green along y, constant blue.
    pub fn render(&self, sequence: u64) -> Vec<u8> {
        let (w, h) = (self.width as u64, self.height as u64);
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let r = (((x + sequence) % w) * 255 / w.max(1)) as u8;
                let g = (y * 255 / h.max(1)) as u8;
                data.extend_from_slice(&[0xff, r, g, 0x80]);
            }
        }
        data
    }
}

impl CaptureSource for SyntheticCamera {
    fn reported_format(&self) -> Dimension {
        Dimension::from_pixels(self.width, self.height)
    }

    fn next_frame(&mut self) -> FrameResult<Option<CameraFrame>> {
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Ok(None);
        }
        let sequence = self.sequence;
        self.sequence += 1;
        let data = self.render(sequence);
        CameraFrame::from_argb(sequence, self.width, self.height, data).map(Some)
    }
}

// SPDX-License-Identifier: MIT
// CPU resize/crop collaborator built on fast_image_resize (SIMD-accelerated).
// ARGB8 in → argb|rgb × uint8|float32 out, written into a caller-provided Vec.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeAlg, ResizeOptions, Resizer};

use crate::error::ScaleError;
use crate::geometry::{Dimension, Rectangle};
use crate::pixel::{BufferMetadata, ElementType, PixelBuffer, PixelFormat};

/// What the resize collaborator is asked to produce.
///
/// `crop` is in source-frame pixels (typically the output of
/// [`centered_square`](crate::geometry::centered_square)); `scale` is the output size.
/// With `rotate` set the source is first turned a quarter clockwise, and `crop` refers to
/// the rotated image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeRequest {
    pub scale: Dimension,
    pub crop: Option<Rectangle>,
    pub rotate: bool,
    pub pixel_format: PixelFormat,
    pub element_type: ElementType,
}

impl ResizeRequest {
    pub fn new(scale: Dimension, pixel_format: PixelFormat, element_type: ElementType) -> Self {
        Self {
            scale,
            crop: None,
            rotate: false,
            pixel_format,
            element_type,
        }
    }

    pub fn with_crop(mut self, crop: Rectangle) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_rotation(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    /// Metadata of the buffer this request produces.
    pub fn output_meta(&self) -> BufferMetadata {
        let (w, h) = self.scale.to_pixels();
        BufferMetadata::new(w, h, self.pixel_format, self.element_type)
    }
}

/// The resize/crop seam. Hosts with a native resizer implement this; [`CpuResizer`] is the
/// portable default.
pub trait FrameResizer: Send {
    /// Resize `src` as described by `req`, replacing the contents of `dst`.
    ///
    /// `dst` is cleared and grown as needed so callers can hand in pooled buffers. On success
    /// `dst.len() == returned.expected_len()`.
    fn resize_into(
        &mut self,
        src: &PixelBuffer,
        req: &ResizeRequest,
        dst: &mut Vec<u8>,
    ) -> Result<BufferMetadata, ScaleError>;

    fn resize(&mut self, src: &PixelBuffer, req: &ResizeRequest) -> Result<PixelBuffer, ScaleError> {
        let mut out = Vec::new();
        let meta = self.resize_into(src, req, &mut out)?;
        PixelBuffer::new(out, meta)
    }
}

/// Pre-allocated scratch for the intermediate ARGB8 image when the requested output layout
/// is not ARGB8 itself.
pub struct Staging {
    pub(crate) buf: Vec<u8>,
}

impl Staging {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }
    pub fn ensure_len(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// Resizer for 4-channel 8-bit ARGB camera frames.
///
/// Holds a reusable [`Resizer`] plus staging and rotation buffers, so steady-state frames of
/// one format do not allocate beyond what `dst` already holds.
pub struct CpuResizer {
    resizer: Resizer,
    staging: Staging,
    rotated: Vec<u8>,
    algorithm: Option<ResizeAlg>,
}

impl Default for CpuResizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
            staging: Staging::with_capacity(0),
            rotated: Vec::new(),
            algorithm: None,
        }
    }

    /// Override the resize algorithm (defaults to fast_image_resize's convolution filter).
    pub fn with_algorithm(mut self, algorithm: ResizeAlg) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    fn options(&self, crop: Option<Rectangle>) -> ResizeOptions {
        // Alpha is the first byte here; fir assumes it last, so never premultiply.
        let mut opts = ResizeOptions::new().use_alpha(false);
        if let Some(alg) = self.algorithm {
            opts = opts.resize_alg(alg);
        }
        if let Some(c) = crop {
            opts = opts.crop(c.x, c.y, c.width, c.height);
        }
        opts
    }
}

impl FrameResizer for CpuResizer {
    fn resize_into(
        &mut self,
        src: &PixelBuffer,
        req: &ResizeRequest,
        dst: &mut Vec<u8>,
    ) -> Result<BufferMetadata, ScaleError> {
        let src_meta = *src.meta();
        if !src_meta.is_guaranteed_supported() {
            return Err(ScaleError::UnsupportedSource {
                pixel_format: src_meta.pixel_format,
                element_type: src_meta.element_type,
            });
        }
        req.scale.validate("scale")?;
        let (src_w, src_h) = if req.rotate {
            rotate_clockwise(src.as_bytes(), src_meta.width, src_meta.height, &mut self.rotated);
            (src_meta.height, src_meta.width)
        } else {
            (src_meta.width, src_meta.height)
        };
        if let Some(crop) = req.crop {
            let frame = Dimension::from_pixels(src_w, src_h);
            crop.size().validate("crop")?;
            if !crop.fits_within(frame) {
                return Err(ScaleError::invalid(
                    "crop",
                    format!(
                        "({}, {}) {}x{} leaves the {}x{} source",
                        crop.x, crop.y, crop.width, crop.height, src_w, src_h
                    ),
                ));
            }
        }

        let out_meta = req.output_meta();
        let (w, h) = (out_meta.width, out_meta.height);
        let argb_len = (w as usize) * (h as usize) * 4;
        let opts = self.options(req.crop);

        let src_bytes = if req.rotate { self.rotated.as_slice() } else { src.as_bytes() };
        let src_view = TypedImageRef::<U8x4>::from_buffer(src_w, src_h, src_bytes)?;

        dst.clear();
        if out_meta.is_guaranteed_supported() {
            dst.resize(argb_len, 0);
            let mut dst_image = TypedImage::<U8x4>::from_buffer(w, h, dst.as_mut_slice())?;
            self.resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
        } else {
            self.staging.ensure_len(argb_len);
            let staged = &mut self.staging.buf[..argb_len];
            let mut dst_image = TypedImage::<U8x4>::from_buffer(w, h, staged)?;
            self.resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
            dst.reserve(out_meta.expected_len());
            convert_argb8(&self.staging.buf[..argb_len], out_meta.pixel_format, out_meta.element_type, dst);
        }

        debug_assert_eq!(dst.len(), out_meta.expected_len());
        Ok(out_meta)
    }
}

/// Turn a `width`×`height` ARGB8 image a quarter clockwise into `dst` (`height`×`width`).
fn rotate_clockwise(src: &[u8], width: u32, height: u32, dst: &mut Vec<u8>) {
    let (w, h) = (width as usize, height as usize);
    let pixels: &[[u8; 4]] = bytemuck::cast_slice(src);
    dst.clear();
    dst.reserve(w * h * 4);
    for row in 0..w {
        for col in 0..h {
            dst.extend_from_slice(&pixels[(h - 1 - col) * w + row]);
        }
    }
}

/// Append the ARGB8 pixels of `src` to `dst` in the requested layout.
fn convert_argb8(src: &[u8], format: PixelFormat, element: ElementType, dst: &mut Vec<u8>) {
    let pixels: &[[u8; 4]] = bytemuck::cast_slice(src);
    let channels = match format {
        PixelFormat::Argb => 0..4,
        PixelFormat::Rgb => 1..4,
    };
    for px in pixels {
        for &c in &px[channels.clone()] {
            match element {
                ElementType::Uint8 => dst.push(c),
                ElementType::Float32 => dst.extend_from_slice(&(c as f32 / 255.0).to_le_bytes()),
            }
        }
    }
}

//! # Capture Modes and Variant Strategies
//!
//! One strategy per capture mode turns a camera frame into the [`FrameVariant`] that gets
//! persisted. The mode is an explicit value chosen at pipeline construction; nothing here
//! consults global toggles.
//!
//! ## Architecture
//!
//! ```text
//! CameraFrame ──▶ VariantStrategy::produce ──▶ FrameVariant ──▶ FramePersister
//!                     │
//!                     ├── FullFrameStrategy               original frame, no resize
//!                     └── ResizingStrategy
//!                           ├── ResizeGeometry::Scale           frame / resize_factor
//!                           └── ResizeGeometry::CenteredSquare  side = min(w, h) / resize_factor
//! ```
//!
//! ## Geometry Caching
//!
//! Device resolution is stable across the frames of a session, so the resize request is
//! computed once per format and cached. [`VariantStrategy::prepare`] seeds the cache from the
//! camera's reported format; a frame arriving with different dimensions recomputes it from
//! the frame itself.
//!
//! ## Orientation
//!
//! Camera APIs report their format, and deliver frames, in landscape. With
//! `FormatOrientation::Portrait` a landscape frame is rotated a quarter clockwise by the
//! resizer and all geometry is computed on the swapped size. Frames that already arrive in
//! portrait are used as they are.

use std::sync::Arc;
use std::time::Instant;

use frame_scale::cpu::{FrameResizer, ResizeRequest};
use frame_scale::geometry::{crop_square_for, scaled_by_factor, Dimension};
use frame_scale::pixel::{ElementType, PixelFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{FormatOrientation, PipelineConfig};
use crate::core::buffer_pool::BufferPool;
use crate::error::{FrameError, FrameResult};
use crate::processing::variant::{
    select_variant, CameraFrame, FormatPolicy, FrameVariant, ResizedBuffer,
};

/// Which variant of each processed frame is persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// The camera frame as delivered.
    #[default]
    Full,
    /// The whole frame scaled down by the resize factor.
    Resized,
    /// A centered square of the frame, side `min(w, h) / resize_factor`.
    Cropped,
}

impl CaptureMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureMode::Full => "full",
            CaptureMode::Resized => "resized",
            CaptureMode::Cropped => "cropped",
        }
    }
}

/// Produces the variant to persist for one frame.
pub trait VariantStrategy: Send {
    fn mode(&self) -> CaptureMode;

    /// Seed cached geometry from the camera's reported (landscape) format.
    fn prepare(&mut self, _reported_format: Dimension) -> FrameResult<()> {
        Ok(())
    }

    /// Turn `frame` into the variant to persist, resizing through `resizer` if needed.
    fn produce(
        &mut self,
        frame: CameraFrame,
        resizer: &mut dyn FrameResizer,
    ) -> FrameResult<FrameVariant>;
}

/// Persist the camera frame untouched.
#[derive(Debug, Clone)]
pub struct FullFrameStrategy {
    policy: FormatPolicy,
}

impl FullFrameStrategy {
    pub fn new(policy: FormatPolicy) -> Self {
        Self { policy }
    }
}

impl VariantStrategy for FullFrameStrategy {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Full
    }

    fn produce(
        &mut self,
        frame: CameraFrame,
        _resizer: &mut dyn FrameResizer,
    ) -> FrameResult<FrameVariant> {
        select_variant(frame, None, None, self.policy)
    }
}

/// Settings shared by the strategies that call the resizer.
#[derive(Debug, Clone, Copy)]
pub struct ResizeSettings {
    pub resize_factor: f64,
    pub pixel_format: PixelFormat,
    pub element_type: ElementType,
    pub policy: FormatPolicy,
    pub orientation: FormatOrientation,
}

impl From<&PipelineConfig> for ResizeSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            resize_factor: config.resize_factor,
            pixel_format: config.pixel_format,
            element_type: config.element_type,
            policy: config.format_policy,
            orientation: config.orientation,
        }
    }
}

/// Request cached for one frame size.
#[derive(Debug, Clone, Copy)]
struct CachedRequest {
    frame: (u32, u32),
    request: ResizeRequest,
}

/// How a resizing strategy derives its request from the (oriented) frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeGeometry {
    /// Whole frame, each side divided by the resize factor.
    Scale,
    /// Centered square of side `min(w, h) / resize_factor`, kept at its own size.
    CenteredSquare,
}

/// Resize through the pool and attach the request's metadata.
fn resize_and_select(
    frame: CameraFrame,
    request: &ResizeRequest,
    resizer: &mut dyn FrameResizer,
    pool: &BufferPool,
    policy: FormatPolicy,
) -> FrameResult<FrameVariant> {
    let mut dst = pool.get_buffer();
    let started = Instant::now();
    let meta = match resizer.resize_into(frame.buffer(), request, &mut dst) {
        Ok(meta) => meta,
        Err(e) => {
            pool.return_buffer(dst);
            return Err(FrameError::from(e).with_operation("resize"));
        }
    };
    let resized = ResizedBuffer {
        data: dst,
        elapsed: started.elapsed(),
    };
    select_variant(frame, Some(resized), Some(meta), policy)
}

/// Strategy for the modes that call the resizer: resized and cropped.
pub struct ResizingStrategy {
    geometry: ResizeGeometry,
    settings: ResizeSettings,
    pool: Arc<BufferPool>,
    cached: Option<CachedRequest>,
}

impl ResizingStrategy {
    pub fn new(geometry: ResizeGeometry, settings: ResizeSettings, pool: Arc<BufferPool>) -> Self {
        Self {
            geometry,
            settings,
            pool,
            cached: None,
        }
    }

    /// Request for a frame delivered at `width`×`height`. Under `Portrait` a landscape frame
    /// is rotated first, so geometry is computed on the swapped size.
    fn compute(&self, width: u32, height: u32) -> FrameResult<ResizeRequest> {
        let (frame, rotate) = self
            .settings
            .orientation
            .orient(Dimension::from_pixels(width, height));
        let factor = self.settings.resize_factor;
        let (format, element) = (self.settings.pixel_format, self.settings.element_type);
        let request = match self.geometry {
            ResizeGeometry::Scale => ResizeRequest::new(scaled_by_factor(frame, factor)?, format, element),
            ResizeGeometry::CenteredSquare => {
                let crop = crop_square_for(frame, factor)?;
                ResizeRequest::new(crop.size(), format, element).with_crop(crop)
            }
        };
        Ok(request.with_rotation(rotate))
    }

    fn request_for(&mut self, width: u32, height: u32) -> FrameResult<ResizeRequest> {
        if let Some(cached) = self.cached.filter(|c| c.frame == (width, height)) {
            return Ok(cached.request);
        }
        let request = self.compute(width, height)?;
        self.cache(width, height, request);
        Ok(request)
    }

    fn cache(&mut self, width: u32, height: u32, request: ResizeRequest) {
        let out = request.output_meta();
        self.pool.resize(out.expected_len());
        debug!(
            mode = self.mode().as_str(),
            frame = %format!("{}x{}", width, height),
            output = %format!("{}x{}", out.width, out.height),
            crop = ?request.crop,
            rotate = request.rotate,
            "resize request computed"
        );
        self.cached = Some(CachedRequest {
            frame: (width, height),
            request,
        });
    }

    pub fn current_request(&self) -> Option<ResizeRequest> {
        self.cached.map(|c| c.request)
    }
}

impl VariantStrategy for ResizingStrategy {
    fn mode(&self) -> CaptureMode {
        match self.geometry {
            ResizeGeometry::Scale => CaptureMode::Resized,
            ResizeGeometry::CenteredSquare => CaptureMode::Cropped,
        }
    }

    /// Frames are expected at the reported size, so the request is cached under it.
    fn prepare(&mut self, reported_format: Dimension) -> FrameResult<()> {
        let (w, h) = reported_format.to_pixels();
        let request = self.compute(w, h)?;
        self.cache(w, h, request);
        Ok(())
    }

    fn produce(
        &mut self,
        frame: CameraFrame,
        resizer: &mut dyn FrameResizer,
    ) -> FrameResult<FrameVariant> {
        let request = self.request_for(frame.width(), frame.height())?;
        resize_and_select(frame, &request, resizer, &self.pool, self.settings.policy)
    }
}

/// Build the strategy for `config.mode`.
pub fn strategy_for(config: &PipelineConfig, pool: Arc<BufferPool>) -> Box<dyn VariantStrategy> {
    let settings = ResizeSettings::from(config);
    match config.mode {
        CaptureMode::Full => Box::new(FullFrameStrategy::new(config.format_policy)),
        CaptureMode::Resized => Box::new(ResizingStrategy::new(ResizeGeometry::Scale, settings, pool)),
        CaptureMode::Cropped => {
            Box::new(ResizingStrategy::new(ResizeGeometry::CenteredSquare, settings, pool))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_scale::cpu::CpuResizer;
    use frame_scale::geometry::Rectangle;
    use frame_scale::pixel::BufferMetadata;

    fn frame(w: u32, h: u32) -> CameraFrame {
        CameraFrame::from_argb(1, w, h, vec![0x80; (w * h * 4) as usize]).unwrap()
    }

    fn pool() -> Arc<BufferPool> {
        Arc::new(BufferPool::new(0, 2))
    }

    #[test]
    fn full_strategy_keeps_original() {
        let mut s = strategy_for(&PipelineConfig::default(), pool());
        let v = s.produce(frame(64, 48), &mut CpuResizer::new()).unwrap();
        assert!(!v.is_resized());
        assert_eq!(*v.meta(), BufferMetadata::argb8(64, 48));
    }

    #[test]
    fn resized_strategy_divides_by_factor() {
        let config = PipelineConfig::new(CaptureMode::Resized);
        let pool = pool();
        let mut s = strategy_for(&config, pool.clone());
        let v = s.produce(frame(640, 480), &mut CpuResizer::new()).unwrap();
        assert!(v.is_resized());
        assert_eq!(*v.meta(), BufferMetadata::argb8(160, 120));
        assert_eq!(pool.buffer_size(), 160 * 120 * 4);
        assert!(v.resize_elapsed().is_some());
    }

    #[test]
    fn cropped_strategy_cuts_centered_square() {
        let settings = ResizeSettings::from(&PipelineConfig::new(CaptureMode::Cropped));
        let mut s = ResizingStrategy::new(ResizeGeometry::CenteredSquare, settings, pool());
        let v = s.produce(frame(400, 300), &mut CpuResizer::new()).unwrap();
        assert_eq!(*v.meta(), BufferMetadata::argb8(75, 75));

        let req = s.current_request().unwrap();
        // side 75, origin round(200 - 37.5) = 163, round(150 - 37.5) = 113
        assert_eq!(
            req.crop,
            Some(Rectangle { x: 163.0, y: 113.0, width: 75.0, height: 75.0 })
        );
    }

    #[test]
    fn portrait_uses_swapped_geometry_for_landscape_frames() {
        let mut config = PipelineConfig::new(CaptureMode::Cropped);
        config.orientation = FormatOrientation::Portrait;
        let settings = ResizeSettings::from(&config);
        let mut s = ResizingStrategy::new(ResizeGeometry::CenteredSquare, settings, pool());
        s.prepare(Dimension::from_pixels(1920, 1080)).unwrap();

        let prepared = s.current_request().unwrap();
        assert!(prepared.rotate);
        assert_eq!(
            prepared.crop,
            Some(Rectangle { x: 405.0, y: 825.0, width: 270.0, height: 270.0 })
        );

        // Landscape frames at the reported size hit the prepared request.
        let v = s.produce(frame(1920, 1080), &mut CpuResizer::new()).unwrap();
        assert_eq!(*v.meta(), BufferMetadata::argb8(270, 270));
        assert_eq!(s.current_request(), Some(prepared));

        // Frames already delivered upright get the same crop without rotation.
        s.produce(frame(1080, 1920), &mut CpuResizer::new()).unwrap();
        let upright = s.current_request().unwrap();
        assert!(!upright.rotate);
        assert_eq!(upright.crop, prepared.crop);
    }

    #[test]
    fn portrait_resized_output_is_upright() {
        let mut config = PipelineConfig::new(CaptureMode::Resized);
        let mut s = strategy_for(&config, pool());
        let landscape = s.produce(frame(160, 120), &mut CpuResizer::new()).unwrap();
        assert_eq!(*landscape.meta(), BufferMetadata::argb8(40, 30));

        config.orientation = FormatOrientation::Portrait;
        let mut s = strategy_for(&config, pool());
        let portrait = s.produce(frame(160, 120), &mut CpuResizer::new()).unwrap();
        assert_eq!(*portrait.meta(), BufferMetadata::argb8(30, 40));
    }

    #[test]
    fn format_change_recomputes_request() {
        let settings = ResizeSettings::from(&PipelineConfig::new(CaptureMode::Resized));
        let mut s = ResizingStrategy::new(ResizeGeometry::Scale, settings, pool());
        let mut resizer = CpuResizer::new();
        s.produce(frame(80, 40), &mut resizer).unwrap();
        assert_eq!(s.current_request().unwrap().output_meta(), BufferMetadata::argb8(20, 10));
        s.produce(frame(40, 80), &mut resizer).unwrap();
        assert_eq!(s.current_request().unwrap().output_meta(), BufferMetadata::argb8(10, 20));
    }

    #[test]
    fn strict_policy_rejects_rgb_output() {
        let mut config = PipelineConfig::new(CaptureMode::Resized);
        config.pixel_format = PixelFormat::Rgb;
        let mut s = strategy_for(&config, pool());
        let err = s.produce(frame(16, 16), &mut CpuResizer::new()).unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedFormat { .. }));

        config.format_policy = FormatPolicy::Passthrough;
        let mut s = strategy_for(&config, pool());
        let v = s.produce(frame(16, 16), &mut CpuResizer::new()).unwrap();
        assert_eq!(v.meta().pixel_format, PixelFormat::Rgb);
        assert_eq!(v.buffer().len(), 4 * 4 * 3);
    }
}

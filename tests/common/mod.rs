//! Common test utilities for the frame_to_file integration tests
//!
//! Frame factories, throwaway persisters and a polling helper for the processing thread.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use frame_to_file::config::PipelineConfig;
use frame_to_file::persist::FramePersister;
use frame_to_file::processing::{CameraFrame, CaptureMode};
use tempfile::TempDir;

/// Solid ARGB8 frame where every pixel is `[0xff, r, g, b]`.
pub fn solid_frame(sequence: u64, width: u32, height: u32, rgb: [u8; 3]) -> CameraFrame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        data.extend_from_slice(&[0xff, rgb[0], rgb[1], rgb[2]]);
    }
    CameraFrame::from_argb(sequence, width, height, data).unwrap()
}

/// Frame whose pixel at (x, y) encodes its own coordinates, for checking crop offsets.
pub fn coordinate_frame(sequence: u64, width: u32, height: u32) -> CameraFrame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[0xff, x as u8, y as u8, 0]);
        }
    }
    CameraFrame::from_argb(sequence, width, height, data).unwrap()
}

/// A ready persister over a fresh temp directory. Keep the `TempDir` alive for the test.
pub fn ready_persister(write_header: bool) -> (TempDir, Arc<FramePersister>) {
    let dir = tempfile::tempdir().unwrap();
    let persister = FramePersister::new(dir.path().join("frames"), write_header);
    persister.initialize().unwrap();
    (dir, Arc::new(persister))
}

/// Config pointing at `dir`, with the given mode.
pub fn config_in(dir: &Path, mode: CaptureMode) -> PipelineConfig {
    let mut config = PipelineConfig::new(mode);
    config.directory = Some(dir.join("frames"));
    config
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .count()
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

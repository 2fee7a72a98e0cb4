//! Run-at-target-fps gate for the frame-processing path.
//!
//! Frames arrive at the camera's native rate. When a target rate is configured, only frames
//! at least `1 / target_fps` after the last accepted one run the resize/persist path; the rest
//! are dropped on the spot. Nothing is queued.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FpsThrottle {
    interval: Option<Duration>,
    last_run: Option<Instant>,
}

impl FpsThrottle {
    /// `None` (or a non-positive rate) lets every frame through.
    pub fn new(target_fps: Option<f64>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / fps));
        Self {
            interval,
            last_run: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Decide whether the frame arriving at `now` runs. Accepting a frame starts a new interval.
    pub fn should_run(&mut self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return true;
        };
        match self.last_run {
            Some(last) if now.saturating_duration_since(last) < interval => false,
            _ => {
                self.last_run = Some(now);
                true
            }
        }
    }

    /// Forget the last accepted frame, e.g. after the directory was cleared.
    pub fn reset(&mut self) {
        self.last_run = None;
    }
}

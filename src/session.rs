//! # Frame Session
//!
//! Runs the capture-and-persist pipeline on a dedicated processing thread and hands the
//! resulting file paths back to a display layer.
//!
//! ## Architecture
//!
//! ```text
//!  camera thread                 "frame-processor" thread                 UI / state
//! ───────────────               ─────────────────────────               ────────────
//! FrameSubmitter::submit ──▶ [slot: 1] ──▶ throttle ──▶ strategy ──▶ persist ──▶ PathSink
//!        │ try_send, drop if full               (resize)                     (never waits)
//! FrameSession::on_app_state ──▶ [control] ──▶ clear_directory
//! ```
//!
//! 1. **FrameSubmitter**: non-blocking, cloneable frame intake for the camera thread
//! 2. **Processing thread**: throttle, variant strategy and persister run synchronously per
//!    frame; the next frame is only taken once the previous one is written or dropped
//! 3. **PathSink**: fire-and-forget hand-off of each written path
//! 4. **AppState**: transitions to `Inactive` or `Background` clear the managed directory
//!
//! ## Dropping, Never Queuing
//!
//! The frame channel has a single slot. A frame that finds it occupied is dropped on the
//! camera thread; a frame the throttle rejects is dropped on the processing thread. While a
//! clear is pending, submitted frames are dropped before they reach the channel.
//!
//! ## Failure Policy
//!
//! Write, resize and state failures drop the frame and the loop continues. A programmer
//! error (bad geometry, missing metadata, unsupported format) stops the processing thread;
//! [`FrameSession::stop`] returns it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use frame_scale::cpu::{CpuResizer, FrameResizer};
use frame_scale::geometry::Dimension;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::core::buffer_pool::BufferPool;
use crate::core::throttle::FpsThrottle;
use crate::error::{classify, FrameError, FrameResult, HasRecoverySuggestion, HasSeverity};
use crate::persist::{FramePersister, PersistResult};
use crate::processing::processing::{strategy_for, CaptureMode, VariantStrategy};
use crate::processing::variant::CameraFrame;

/// Idle resize buffers kept between frames.
const POOLED_BUFFERS: usize = 2;

/// Host application lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

impl AppState {
    /// Entering this state clears the managed directory.
    pub fn triggers_clear(self) -> bool {
        matches!(self, AppState::Inactive | AppState::Background)
    }
}

/// Receives written file paths. Implementations must never block.
pub trait PathSink: Send {
    /// Offer `path` to the consumer. Returns false if it was dropped.
    fn offer(&self, path: PathBuf) -> bool;
}

impl PathSink for Sender<PathBuf> {
    fn offer(&self, path: PathBuf) -> bool {
        self.try_send(path).is_ok()
    }
}

/// Latest-value hand-off for async UIs: a slow consumer only ever sees the newest path.
impl PathSink for tokio::sync::watch::Sender<Option<PathBuf>> {
    fn offer(&self, path: PathBuf) -> bool {
        self.send_replace(Some(path));
        true
    }
}

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// The processing thread is still busy with the previous frame.
    DroppedBusy,
    /// A directory clear is pending.
    DroppedClearing,
    /// The processing thread has stopped.
    Closed,
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub submitted: u64,
    pub dropped_busy: u64,
    pub dropped_clearing: u64,
    pub throttled: u64,
    pub persisted: u64,
    pub failed: u64,
    pub paths_dropped: u64,
    pub files_cleared: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    dropped_busy: AtomicU64,
    dropped_clearing: AtomicU64,
    throttled: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
    paths_dropped: AtomicU64,
    files_cleared: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped_busy: self.dropped_busy.load(Ordering::Relaxed),
            dropped_clearing: self.dropped_clearing.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            paths_dropped: self.paths_dropped.load(Ordering::Relaxed),
            files_cleared: self.files_cleared.load(Ordering::Relaxed),
        }
    }
}

enum Control {
    AppState(AppState),
    Shutdown,
}

/// Non-blocking frame intake, safe to clone onto the camera thread.
#[derive(Clone)]
pub struct FrameSubmitter {
    frames: Sender<CameraFrame>,
    clearing: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl FrameSubmitter {
    /// Hand a frame to the processing thread, or drop it. Never blocks.
    pub fn submit(&self, frame: CameraFrame) -> SubmitOutcome {
        Counters::bump(&self.counters.submitted);
        if self.clearing.load(Ordering::Acquire) {
            Counters::bump(&self.counters.dropped_clearing);
            return SubmitOutcome::DroppedClearing;
        }
        match self.frames.try_send(frame) {
            Ok(()) => SubmitOutcome::Accepted,
            Err(TrySendError::Full(_)) => {
                Counters::bump(&self.counters.dropped_busy);
                SubmitOutcome::DroppedBusy
            }
            Err(TrySendError::Disconnected(_)) => SubmitOutcome::Closed,
        }
    }
}

/// A running capture-and-persist pipeline.
pub struct FrameSession {
    submitter: FrameSubmitter,
    control: Sender<Control>,
    persister: Arc<FramePersister>,
    app_state: Mutex<AppState>,
    handle: Option<JoinHandle<FrameResult<()>>>,
}

impl FrameSession {
    pub fn builder(config: PipelineConfig) -> FrameSessionBuilder {
        FrameSessionBuilder::new(config)
    }

    pub fn submitter(&self) -> FrameSubmitter {
        self.submitter.clone()
    }

    /// Shorthand for `submitter().submit(frame)`.
    pub fn submit(&self, frame: CameraFrame) -> SubmitOutcome {
        self.submitter.submit(frame)
    }

    pub fn persister(&self) -> &Arc<FramePersister> {
        &self.persister
    }

    pub fn stats(&self) -> SessionStats {
        self.submitter.counters.snapshot()
    }

    /// Record a host lifecycle transition. Entering `Inactive` or `Background` schedules a
    /// directory clear on the processing thread; frames are dropped until it completes.
    pub fn on_app_state(&self, state: AppState) {
        let mut current = self.app_state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == state {
            return;
        }
        debug!(from = ?*current, to = ?state, "app state changed");
        *current = state;
        if state.triggers_clear() {
            self.submitter.clearing.store(true, Ordering::Release);
        }
        if self.control.send(Control::AppState(state)).is_err() {
            self.submitter.clearing.store(false, Ordering::Release);
        }
    }

    /// Stop the processing thread and return the final counters.
    ///
    /// # Errors
    /// The programmer error that stopped the thread early, if any.
    pub fn stop(mut self) -> FrameResult<SessionStats> {
        self.shutdown()?;
        let stats = self.stats();
        info!(
            persisted = stats.persisted,
            failed = stats.failed,
            dropped_busy = stats.dropped_busy,
            throttled = stats.throttled,
            "frame session stopped"
        );
        Ok(stats)
    }

    fn shutdown(&mut self) -> FrameResult<()> {
        let _ = self.control.send(Control::Shutdown);
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(FrameError::state(
                    "Panicked",
                    "stop",
                    "frame processing thread panicked",
                ))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for FrameSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "frame session ended with an error");
        }
    }
}

/// Builder for [`FrameSession`].
pub struct FrameSessionBuilder {
    config: PipelineConfig,
    persister: Option<Arc<FramePersister>>,
    resizer: Option<Box<dyn FrameResizer>>,
    sink: Option<Box<dyn PathSink>>,
    reported_format: Option<Dimension>,
}

impl FrameSessionBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            persister: None,
            resizer: None,
            sink: None,
            reported_format: None,
        }
    }

    /// Use an already initialized persister instead of creating one from the config.
    pub fn with_persister(mut self, persister: Arc<FramePersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Replace the default [`CpuResizer`].
    pub fn with_resizer<R: FrameResizer + 'static>(mut self, resizer: R) -> Self {
        self.resizer = Some(Box::new(resizer));
        self
    }

    pub fn with_path_sink<S: PathSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Hand paths off over a bounded channel of `path_channel_capacity` slots. Paths are
    /// dropped while it is full.
    pub fn with_path_channel(self) -> (Self, Receiver<PathBuf>) {
        let (tx, rx) = bounded(self.config.path_channel_capacity);
        (self.with_path_sink(tx), rx)
    }

    /// The camera's reported (landscape) format, used to precompute crop/scale geometry.
    pub fn with_reported_format(mut self, format: Dimension) -> Self {
        self.reported_format = Some(format);
        self
    }

    /// Validate, prepare geometry and start the processing thread.
    pub fn build(self) -> FrameResult<FrameSession> {
        self.config.validate()?;

        let persister = match self.persister {
            Some(persister) => persister,
            None => Arc::new(crate::init(&self.config)?),
        };
        if persister.state() == crate::persist::PersisterState::Uninitialized {
            persister.initialize()?;
        }

        let pool = Arc::new(BufferPool::new(0, POOLED_BUFFERS));
        let mut strategy = strategy_for(&self.config, pool.clone());
        if let Some(format) = self.reported_format {
            strategy.prepare(format)?;
        }

        let (frame_tx, frame_rx) = bounded::<CameraFrame>(1);
        let (control_tx, control_rx) = unbounded::<Control>();
        let clearing = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            mode: self.config.mode,
            throttle: FpsThrottle::new(self.config.target_fps),
            strategy,
            resizer: self
                .resizer
                .unwrap_or_else(|| Box::new(CpuResizer::new())),
            persister: persister.clone(),
            pool,
            sink: self.sink,
            clearing: clearing.clone(),
            counters: counters.clone(),
        };

        let handle = thread::Builder::new()
            .name("frame-processor".into())
            .spawn(move || worker.run(frame_rx, control_rx))
            .map_err(|e| FrameError::initialization("frame session", e.to_string()))?;

        info!(
            mode = self.config.mode.as_str(),
            dir = %persister.directory().display(),
            target_fps = ?self.config.target_fps,
            "frame session started"
        );

        Ok(FrameSession {
            submitter: FrameSubmitter {
                frames: frame_tx,
                clearing,
                counters,
            },
            control: control_tx,
            persister,
            app_state: Mutex::new(AppState::Active),
            handle: Some(handle),
        })
    }
}

/// State owned by the processing thread.
struct Worker {
    mode: CaptureMode,
    throttle: FpsThrottle,
    strategy: Box<dyn VariantStrategy>,
    resizer: Box<dyn FrameResizer>,
    persister: Arc<FramePersister>,
    pool: Arc<BufferPool>,
    sink: Option<Box<dyn PathSink>>,
    clearing: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl Worker {
    fn run(mut self, frames: Receiver<CameraFrame>, control: Receiver<Control>) -> FrameResult<()> {
        loop {
            // Control first, so a pending clear never waits behind a frame.
            while let Ok(msg) = control.try_recv() {
                if !self.handle_control(msg) {
                    return Ok(());
                }
            }
            crossbeam_channel::select! {
                recv(control) -> msg => match msg {
                    Ok(msg) => {
                        if !self.handle_control(msg) {
                            return Ok(());
                        }
                    }
                    Err(_) => return Ok(()),
                },
                recv(frames) -> frame => match frame {
                    Ok(frame) => self.handle_frame(frame)?,
                    Err(_) => return Ok(()),
                },
            }
        }
    }

    /// Returns false on shutdown.
    fn handle_control(&mut self, msg: Control) -> bool {
        match msg {
            Control::Shutdown => false,
            Control::AppState(state) => {
                if state.triggers_clear() {
                    let report = self.persister.clear_directory();
                    self.counters
                        .files_cleared
                        .fetch_add(report.deleted as u64, Ordering::Relaxed);
                    self.throttle.reset();
                    self.clearing.store(false, Ordering::Release);
                }
                true
            }
        }
    }

    fn handle_frame(&mut self, frame: CameraFrame) -> FrameResult<()> {
        if !self.throttle.should_run(frame.captured_at) {
            Counters::bump(&self.counters.throttled);
            return Ok(());
        }
        match self.process(frame) {
            Ok(result) => {
                Counters::bump(&self.counters.persisted);
                let delivered = match &self.sink {
                    Some(sink) => sink.offer(result.path),
                    None => true,
                };
                if !delivered {
                    Counters::bump(&self.counters.paths_dropped);
                    debug!("path consumer busy; path dropped");
                }
                Ok(())
            }
            Err(e) if classify::is_programmer_error(&e) => {
                Counters::bump(&self.counters.failed);
                error!(
                    category = e.category(),
                    hint = e.recovery_suggestion().unwrap_or_default(),
                    error = %e,
                    "pipeline misconfigured; stopping"
                );
                Err(e)
            }
            Err(e) if classify::drops_frame(&e) => {
                Counters::bump(&self.counters.failed);
                warn!(category = e.category(), error = %e, "frame dropped");
                Ok(())
            }
            Err(e) => {
                Counters::bump(&self.counters.failed);
                error!(category = e.category(), severity = ?e.severity(), error = %e, "frame dropped");
                Ok(())
            }
        }
    }

    fn process(&mut self, frame: CameraFrame) -> FrameResult<PersistResult> {
        let (src_w, src_h) = (frame.width(), frame.height());
        let variant = self.strategy.produce(frame, self.resizer.as_mut())?;
        let (out_w, out_h) = (variant.meta().width, variant.meta().height);
        let resized = variant.is_resized();

        let persisted = self.persister.persist(&variant);
        if resized {
            let (bytes, _) = variant.into_buffer().into_parts();
            self.pool.return_buffer(bytes);
        }
        let result = persisted?;

        match self.mode {
            CaptureMode::Full => info!(
                "Frame saved as {}x{}; Saved to disk in {}ms;",
                out_w, out_h, result.write_duration_ms
            ),
            CaptureMode::Resized | CaptureMode::Cropped => info!(
                "Frame {} from {}x{} to {}x{} in {}ms; Saved to disk in {}ms;",
                if self.mode == CaptureMode::Resized { "resized" } else { "cropped" },
                src_w,
                src_h,
                out_w,
                out_h,
                result.resize_duration_ms.unwrap_or_default(),
                result.write_duration_ms
            ),
        }
        Ok(result)
    }
}

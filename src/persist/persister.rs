//! # Frame Persister
//!
//! Writes selected frame buffers into one managed directory and clears that directory on
//! demand.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──▶ Clearing ──▶ Ready ──▶ Persisting ──▶ Ready ──▶ …
//!                      ▲                                    │
//!                      └────────── clear_directory ─────────┘
//! ```
//!
//! Clearing and writing exclude each other through this state gate, not through filesystem
//! locks. `clear_directory` waits for an in-flight write to finish before it starts deleting;
//! a `persist` that arrives while clearing fails with a `State` error and the frame is dropped.
//!
//! ## File Names
//!
//! `frame_<UTC yyyyMMdd_HHmmss_SSS>_<pid>_<sequence>.raw`. The sequence is a process-wide
//! atomic counter, so two calls in the same millisecond still get distinct names, and files
//! are opened with `create_new` so an existing file is never overwritten.
//!
//! ## Timing
//!
//! `PersistResult` keeps the resize/selection time (carried by the variant) and the write
//! time (measured here) apart. Neither includes the other.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{FrameError, FrameResult};
use crate::persist::raw;
use crate::processing::variant::FrameVariant;

/// Process-wide, so separate persisters sharing a directory never collide either.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Lifecycle state of a [`FramePersister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersisterState {
    Uninitialized,
    Clearing,
    Ready,
    Persisting,
}

impl PersisterState {
    pub fn as_str(self) -> &'static str {
        match self {
            PersisterState::Uninitialized => "Uninitialized",
            PersisterState::Clearing => "Clearing",
            PersisterState::Ready => "Ready",
            PersisterState::Persisting => "Persisting",
        }
    }
}

/// Outcome of one successful `persist`.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistResult {
    /// Absolute path of the written file
    pub path: PathBuf,
    /// Resize and selection time; `None` for the original frame
    pub resize_duration_ms: Option<u64>,
    pub write_duration_ms: u64,
    /// Bytes written, header included
    pub bytes_written: usize,
}

/// Outcome of `clear_directory`. Always produced, even when some deletions failed.
#[derive(Debug)]
pub struct ClearReport {
    pub deleted: usize,
    /// One `DeleteFailed` (or `Io`) per file that could not be removed
    pub failures: Vec<FrameError>,
    pub elapsed: Duration,
}

impl ClearReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes frame variants into the managed directory.
pub struct FramePersister {
    directory: PathBuf,
    write_header: bool,
    state: Mutex<PersisterState>,
    idle: Condvar,
    remove_file: fn(&Path) -> std::io::Result<()>,
}

fn remove_frame_file(path: &Path) -> std::io::Result<()> {
    fs::remove_file(path)
}

impl std::fmt::Debug for FramePersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePersister")
            .field("directory", &self.directory)
            .field("write_header", &self.write_header)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Restores `Ready` and wakes waiters when a write or clear ends, even by unwinding.
struct Transition<'a> {
    persister: &'a FramePersister,
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        *self.persister.lock_state() = PersisterState::Ready;
        self.persister.idle.notify_all();
    }
}

impl FramePersister {
    /// A persister for `directory`, in `Uninitialized`. Call [`initialize`](Self::initialize)
    /// before persisting.
    ///
    /// A relative `directory` is resolved against the current directory here, so returned
    /// paths are always absolute.
    pub fn new(directory: impl Into<PathBuf>, write_header: bool) -> Self {
        let directory = directory.into();
        Self {
            directory: std::path::absolute(&directory).unwrap_or(directory),
            write_header,
            state: Mutex::new(PersisterState::Uninitialized),
            idle: Condvar::new(),
            remove_file: remove_frame_file,
        }
    }

    /// Swap the per-file removal used by [`clear_directory`](Self::clear_directory).
    #[cfg(test)]
    fn with_remove_file(mut self, remove_file: fn(&Path) -> std::io::Result<()>) -> Self {
        self.remove_file = remove_file;
        self
    }

    /// Create the managed directory and run the start-up clear. Leaves the persister `Ready`.
    pub fn initialize(&self) -> FrameResult<ClearReport> {
        fs::create_dir_all(&self.directory).map_err(|e| {
            FrameError::initialization(
                "frame persister",
                format!("cannot create {}: {}", self.directory.display(), e),
            )
        })?;
        Ok(self.clear_directory())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn writes_header(&self) -> bool {
        self.write_header
    }

    pub fn state(&self) -> PersisterState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, PersisterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait out an in-flight write or clear, then move to `next`.
    fn enter(&self, next: PersisterState) -> PersisterState {
        let mut state = self.lock_state();
        while matches!(*state, PersisterState::Persisting | PersisterState::Clearing) {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        let previous = *state;
        *state = next;
        previous
    }

    fn next_path(&self) -> PathBuf {
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        self.directory
            .join(format!("frame_{}_{}_{:08}.raw", stamp, std::process::id(), seq))
    }

    /// Write the variant's buffer to a new, uniquely named file.
    ///
    /// # Errors
    /// - `State` unless the persister is `Ready` (never initialized, or clearing)
    /// - `WriteFailed` on any I/O failure; the partial file is removed
    pub fn persist(&self, variant: &FrameVariant) -> FrameResult<PersistResult> {
        {
            let mut state = self.lock_state();
            while *state == PersisterState::Persisting {
                state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            if *state != PersisterState::Ready {
                return Err(FrameError::state(
                    state.as_str(),
                    "persist",
                    "frames are only written while Ready",
                )
                .with_operation("persist"));
            }
            *state = PersisterState::Persisting;
        }
        let _transition = Transition { persister: self };

        let buffer = variant.buffer();
        let path = self.next_path();
        let started = Instant::now();
        let bytes_written = self.write_file(&path, variant).map_err(|e| {
            FrameError::write_failed(&path, e)
                .with_operation("persist")
                .with_metadata("bytes", buffer.len().to_string())
        })?;
        let write_duration = started.elapsed();

        let result = PersistResult {
            path,
            resize_duration_ms: variant.resize_elapsed().map(|d| d.as_millis() as u64),
            write_duration_ms: write_duration.as_millis() as u64,
            bytes_written,
        };
        debug!(
            path = %result.path.display(),
            bytes = result.bytes_written,
            write_ms = result.write_duration_ms,
            resize_ms = ?result.resize_duration_ms,
            "frame persisted"
        );
        Ok(result)
    }

    /// Create `path` and write the variant into it. A file this call created is removed again
    /// if writing fails; a file that already existed is never touched.
    fn write_file(&self, path: &Path, variant: &FrameVariant) -> std::io::Result<usize> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        self.write_contents(file, variant).inspect_err(|_| {
            let _ = fs::remove_file(path);
        })
    }

    fn write_contents(&self, mut file: fs::File, variant: &FrameVariant) -> std::io::Result<usize> {
        let buffer = variant.buffer();
        let mut written = 0;
        if self.write_header {
            let header = raw::encode_header(buffer.meta());
            file.write_all(&header)?;
            written += header.len();
        }
        file.write_all(buffer.as_bytes())?;
        written += buffer.len();
        Ok(written)
    }

    /// Delete every regular file in the managed directory.
    ///
    /// Best effort: a file that cannot be removed is logged and recorded, and the remaining
    /// files are still deleted. Subdirectories are left alone and not counted. A missing
    /// directory is recreated and reports zero deletions.
    pub fn clear_directory(&self) -> ClearReport {
        let previous = self.enter(PersisterState::Clearing);
        let _transition = Transition { persister: self };
        debug!(from = previous.as_str(), dir = %self.directory.display(), "clearing frame directory");

        let started = Instant::now();
        let mut deleted = 0;
        let mut failures = Vec::new();

        match fs::read_dir(&self.directory) {
            Ok(entries) => {
                for entry in entries {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            warn!(error = %e, "failed to read directory entry");
                            failures.push(FrameError::io_at("read_dir", &self.directory, e));
                            continue;
                        }
                    };
                    let path = entry.path();
                    if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                        continue;
                    }
                    match (self.remove_file)(&path) {
                        Ok(()) => deleted += 1,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "failed to delete frame file");
                            failures.push(FrameError::delete_failed(path, e));
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Err(e) = fs::create_dir_all(&self.directory) {
                    warn!(dir = %self.directory.display(), error = %e, "failed to recreate frame directory");
                    failures.push(FrameError::io_at("create_dir_all", &self.directory, e));
                }
            }
            Err(e) => {
                warn!(dir = %self.directory.display(), error = %e, "failed to list frame directory");
                failures.push(FrameError::io_at("read_dir", &self.directory, e));
            }
        }

        let elapsed = started.elapsed();
        info!(
            deleted,
            failed = failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Took {}ms to delete {} files",
            elapsed.as_millis(),
            deleted
        );
        ClearReport {
            deleted,
            failures,
            elapsed,
        }
    }
}

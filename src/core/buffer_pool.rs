//! # Buffer Pool Module
//!
//! Reusable output buffers for the resize step. Every processed frame in resized or cropped
//! mode needs a destination buffer of the same size; the pool hands the previous frame's
//! allocation back instead of allocating a fresh one per frame.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   Strategy      │───▶│  Frame          │───▶│  Session        │
//! │   (resize into) │    │  Persister      │    │  (return bytes) │
//! └─────────────────┘    └─────────────────┘    └────────┬────────┘
//!          ▲                                             │
//!          └──────────────── BufferPool ◀────────────────┘
//! ```
//!
//! A format change changes the output size. [`BufferPool::resize`] drains the pool and
//! undersized buffers returned later are dropped rather than pooled.
//!
//! ## Example
//!
//! ```rust
//! use frame_to_file::core::buffer_pool::BufferPool;
//!
//! let pool = BufferPool::new(480 * 270 * 4, 2);
//! let buffer = pool.get_buffer();
//! assert!(buffer.capacity() >= 480 * 270 * 4);
//! pool.return_buffer(buffer);
//! assert_eq!(pool.stats(), (1, 2));
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct PoolInner {
    buffers: VecDeque<Vec<u8>>,
    buffer_size: usize,
}

/// Bounded pool of byte buffers sized for one resize output.
#[derive(Debug)]
pub struct BufferPool {
    inner: Mutex<PoolInner>,
    max_buffers: usize,
}

impl BufferPool {
    /// `buffer_size` is the byte length of one output frame; at most `max_buffers` idle
    /// buffers are kept.
    pub fn new(buffer_size: usize, max_buffers: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                buffers: VecDeque::with_capacity(max_buffers),
                buffer_size,
            }),
            max_buffers,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// An empty buffer with capacity for at least one output frame.
    ///
    /// Reuses a pooled buffer when one is idle, otherwise allocates.
    pub fn get_buffer(&self) -> Vec<u8> {
        let mut inner = self.lock();
        match inner.buffers.pop_front() {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => Vec::with_capacity(inner.buffer_size),
        }
    }

    /// Give a buffer back for reuse. Buffers too small for the current size, or beyond
    /// `max_buffers`, are dropped.
    pub fn return_buffer(&self, buffer: Vec<u8>) {
        let mut inner = self.lock();
        if buffer.capacity() >= inner.buffer_size && inner.buffers.len() < self.max_buffers {
            inner.buffers.push_back(buffer);
        }
    }

    /// `(available_buffers, max_buffers)`
    pub fn stats(&self) -> (usize, usize) {
        (self.lock().buffers.len(), self.max_buffers)
    }

    pub fn buffer_size(&self) -> usize {
        self.lock().buffer_size
    }

    /// Switch to a new output size. Idle buffers are discarded if the size changed.
    pub fn resize(&self, new_size: usize) {
        let mut inner = self.lock();
        if inner.buffer_size != new_size {
            inner.buffers.clear();
            inner.buffer_size = new_size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_basic() {
        let pool = BufferPool::new(1024, 3);

        let buf1 = pool.get_buffer();
        assert!(buf1.capacity() >= 1024);
        assert!(buf1.is_empty());

        pool.return_buffer(buf1);
        let buf2 = pool.get_buffer();
        assert!(buf2.capacity() >= 1024);

        let (available, max) = pool.stats();
        assert_eq!(available, 0);
        assert_eq!(max, 3);
    }

    #[test]
    fn test_buffer_pool_overflow() {
        let pool = BufferPool::new(512, 2);

        let buf1 = pool.get_buffer();
        let buf2 = pool.get_buffer();
        let buf3 = pool.get_buffer();

        pool.return_buffer(buf1);
        pool.return_buffer(buf2);
        pool.return_buffer(buf3);

        let (available, _) = pool.stats();
        assert_eq!(available, 2);
    }

    #[test]
    fn test_returned_buffer_is_cleared_on_reuse() {
        let pool = BufferPool::new(4, 1);
        let mut buf = pool.get_buffer();
        buf.extend_from_slice(&[1, 2, 3, 4]);
        pool.return_buffer(buf);
        assert!(pool.get_buffer().is_empty());
    }

    #[test]
    fn test_resize_drains_and_rejects_stale_buffers() {
        let pool = BufferPool::new(16, 4);
        let small = pool.get_buffer();
        pool.return_buffer(pool.get_buffer());
        assert_eq!(pool.stats().0, 1);

        pool.resize(1024);
        assert_eq!(pool.stats().0, 0);
        assert_eq!(pool.buffer_size(), 1024);

        // Allocated for the old format, too small now.
        pool.return_buffer(small);
        assert_eq!(pool.stats().0, 0);

        // Same size: keep what is pooled.
        pool.return_buffer(pool.get_buffer());
        pool.resize(1024);
        assert_eq!(pool.stats().0, 1);
    }
}

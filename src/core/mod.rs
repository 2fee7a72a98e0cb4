//! # Core Infrastructure Module
//!
//! Resource plumbing shared by the processing path: pooled resize buffers and the
//! run-at-target-fps gate.

pub mod buffer_pool;
pub mod throttle;

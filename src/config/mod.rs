//! # Configuration Module
//!
//! This module provides the explicit configuration passed to pipeline construction.

pub mod config;

pub use config::{FormatOrientation, PipelineConfig};

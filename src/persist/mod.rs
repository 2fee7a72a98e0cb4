//! # Persistence Module
//!
//! The frame persister and the raw container format it writes.

pub mod persister;
pub mod raw;

pub use persister::{ClearReport, FramePersister, PersistResult, PersisterState};
pub use raw::read_persisted;

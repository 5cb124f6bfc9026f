//! Labelled session recording: config validation, the recorder state machine,
//! the on-disk container and offline summaries.

pub mod config;
pub mod container;
pub mod recorder;
pub mod summary;

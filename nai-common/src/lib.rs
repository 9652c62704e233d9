//! # NAI Common Library
//!
//! Shared code for the NAI preset/template client:
//! - Tag-set algebra over preset values
//! - Preset/template data model and value merging
//! - IPC envelopes exchanged with the sidecar worker
//! - Progress and ETA formatting
//! - Configuration loading and sidecar root resolution

pub mod config;
pub mod error;
pub mod ipc;
pub mod preset;
pub mod progress;
pub mod tags;

pub use error::{Error, Result};
pub use preset::{ApplyMode, Preset, PresetValue, PresetVariable};

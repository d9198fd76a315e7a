// src/config/mod.rs

//! Settings loading and validation for buildtrace.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and the CI-settings provider (`model.rs`).
//! - Load a settings file from disk (`loader.rs`).
//! - Validate durations and the protocol marker (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    CiSection, CiSettings, ProcessSection, ProtocolSection, RawSettings, Settings,
    DEFAULT_MARKER,
};
pub use validate::parse_duration;

// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: TOML-backed data model and the validated [`EngineConfig`].
//! - `loader.rs`: reading engine config and task definition files.
//! - `validate.rs`: defaults, duration parsing and sanity checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_tasks};
pub use model::{
    EngineConfig, EngineSection, IntervalsSection, RawEngineConfig, TaskFile, Timeouts,
    TimeoutsSection,
};
pub use validate::{parse_duration, validate_config};

// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::api::Task;
use crate::config::model::{EngineConfig, RawEngineConfig, TaskFile};
use crate::errors::Result;

/// Load an engine config file and return the raw, unvalidated sections.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawEngineConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawEngineConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load an engine config file, apply defaults and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let raw = load_from_path(path)?;
    EngineConfig::try_from(raw)
}

/// Load task definitions from a TOML file.
///
/// Only deserialization happens here; dependency validation is the
/// engine's job at admission time.
pub fn load_tasks(path: impl AsRef<Path>) -> Result<Vec<Task>> {
    let contents = fs::read_to_string(path.as_ref())?;
    let file: TaskFile = toml::from_str(&contents)?;
    Ok(file.tasks)
}

/// Default location of the engine config file.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("taskengine.toml")
}

// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Dependency cycle in task {task}: {}", .containers.join(" -> "))]
    DependencyCycle { task: String, containers: Vec<String> },

    #[error("Container '{container}' depends on unknown container '{dependency}'")]
    UnknownDependency { container: String, dependency: String },

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Unable to subscribe to runtime events: {0}")]
    EventStream(String),

    #[error("Unable to load saved state: {0}")]
    StateLoad(String),

    #[error("Network setup error: {0}")]
    Network(String),

    #[error("Unable to list network links: {0}")]
    LinkList(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EngineError>;

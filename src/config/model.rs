// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::api::Task;
use crate::runtime::RuntimeVersion;

/// Engine configuration as read from a TOML file.
///
/// Every key is optional; anything left out keeps the value from
/// [`EngineConfig::default`].
///
/// ```toml
/// [engine]
/// cluster = "prod"
/// pause_image = "registry.local/pause:3.9"
///
/// [timeouts]
/// start = "3m"
/// stop = "30s"
///
/// [intervals]
/// steady_state_verify = "5m"
/// task_cleanup_wait = "3h"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEngineConfig {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub timeouts: TimeoutsSection,

    #[serde(default)]
    pub intervals: IntervalsSection,
}

/// `[engine]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    pub cluster: Option<String>,

    /// Image of the network-setup container. Never pulled.
    pub pause_image: Option<String>,

    /// Prefix of the labels the engine adds to every container.
    pub label_prefix: Option<String>,

    /// Prefix of generated runtime container names.
    pub runtime_name_prefix: Option<String>,

    /// Capacity of the outbound state-change channel.
    pub state_change_buffer: Option<usize>,

    /// Capacity of each managed task's inbox.
    pub task_inbox_size: Option<usize>,

    /// Runtimes at or above this version pull images concurrently.
    pub concurrent_pull_min_version: Option<String>,

    /// Attempts per transition before a container is given up on.
    pub max_transition_attempts: Option<u32>,

    pub block_instance_metadata: Option<bool>,
}

/// `[timeouts]` section; duration strings such as `"500ms"`, `"30s"`, `"4m"`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutsSection {
    pub pull: Option<String>,
    pub create: Option<String>,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub provision: Option<String>,
    pub remove: Option<String>,
    pub inspect: Option<String>,
}

/// `[intervals]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntervalsSection {
    pub steady_state_verify: Option<String>,
    pub task_cleanup_wait: Option<String>,
    pub transition_retry_delay: Option<String>,
    pub attachment_reconcile: Option<String>,
}

/// Per-action timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub pull: Duration,
    pub create: Duration,
    pub start: Duration,
    pub stop: Duration,
    pub provision: Duration,
    pub remove: Duration,
    pub inspect: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            pull: Duration::from_secs(2 * 60 * 60),
            create: Duration::from_secs(4 * 60),
            start: Duration::from_secs(3 * 60),
            stop: Duration::from_secs(30),
            provision: Duration::from_secs(60),
            remove: Duration::from_secs(5 * 60),
            inspect: Duration::from_secs(30),
        }
    }
}

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub cluster: String,
    pub pause_image: String,
    pub label_prefix: String,
    pub runtime_name_prefix: String,
    pub state_change_buffer: usize,
    pub task_inbox_size: usize,
    pub concurrent_pull_min_version: RuntimeVersion,
    pub max_transition_attempts: u32,
    pub block_instance_metadata: bool,
    pub timeouts: Timeouts,
    pub steady_state_verify_interval: Duration,
    pub task_cleanup_wait: Duration,
    pub transition_retry_delay: Duration,
    pub attachment_reconcile_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster: "default".to_string(),
            pause_image: "taskengine/pause:latest".to_string(),
            label_prefix: "io.taskengine.".to_string(),
            runtime_name_prefix: "te".to_string(),
            state_change_buffer: 64,
            task_inbox_size: 32,
            concurrent_pull_min_version: RuntimeVersion::new(1, 11, 1),
            max_transition_attempts: 3,
            block_instance_metadata: false,
            timeouts: Timeouts::default(),
            steady_state_verify_interval: Duration::from_secs(5 * 60),
            task_cleanup_wait: Duration::from_secs(3 * 60 * 60),
            transition_retry_delay: Duration::from_secs(1),
            attachment_reconcile_interval: Duration::from_secs(60),
        }
    }
}

/// A file of task definitions, one `[[task]]` table per task:
///
/// ```toml
/// [[task]]
/// arn = "arn:task/web"
/// family = "web"
/// version = "3"
///
/// [[task.container]]
/// name = "app"
/// image = "nginx:1.27"
/// links = ["cache"]
///
/// [[task.container]]
/// name = "cache"
/// image = "redis:7"
/// essential = false
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFile {
    #[serde(default, rename = "task")]
    pub tasks: Vec<Task>,
}

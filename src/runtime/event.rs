// src/runtime/event.rs

use std::collections::BTreeMap;

use crate::api::ContainerStatus;

/// Opaque details attached to a status report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerMetadata {
    pub runtime_id: Option<String>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

/// A status change reported by the runtime's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerChangeEvent {
    pub runtime_id: String,
    pub status: ContainerStatus,
    pub metadata: ContainerMetadata,
}

impl ContainerChangeEvent {
    pub fn new(runtime_id: impl Into<String>, status: ContainerStatus) -> Self {
        let runtime_id = runtime_id.into();
        Self {
            metadata: ContainerMetadata {
                runtime_id: Some(runtime_id.clone()),
                ..ContainerMetadata::default()
            },
            runtime_id,
            status,
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.metadata.exit_code = Some(exit_code);
        self
    }
}

/// Everything the runtime needs to create a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub network_mode: Option<String>,
}

/// Result of inspecting a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    pub runtime_id: String,
    pub pid: u32,
    pub status: ContainerStatus,
}

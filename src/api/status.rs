// src/api/status.rs

//! Lifecycle statuses for containers and tasks.
//!
//! Both enums derive `Ord` in lifecycle order, so "later in the lifecycle" is
//! simply `>` and `Ord::cmp` is the comparison used everywhere. Known statuses
//! only move forward; [`ContainerStatus::is_forward_of`] is the single check the
//! engine runs before applying any reported status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Container lifecycle status, in lifecycle order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerStatus {
    #[default]
    None,
    Pulled,
    Created,
    Running,
    ResourcesProvisioned,
    Stopped,
    Dead,
}

impl ContainerStatus {
    /// True for STOPPED and DEAD.
    pub fn is_terminal(self) -> bool {
        matches!(self, ContainerStatus::Stopped | ContainerStatus::Dead)
    }

    /// Whether moving from `current` to `self` is a forward move.
    ///
    /// Equal statuses are not forward; a duplicate report is discarded.
    pub fn is_forward_of(self, current: ContainerStatus) -> bool {
        self > current
    }

    /// Whether a container at this status has reached `steady_state`
    /// and is still running.
    pub fn is_steady(self, steady_state: ContainerStatus) -> bool {
        self >= steady_state && !self.is_terminal()
    }

    /// The task-level status a container at this status contributes.
    ///
    /// A container counts as RUNNING only once it has reached its own steady
    /// state, so a network-setup container that is started but not yet
    /// provisioned still holds the task at CREATED.
    pub fn task_status(self, steady_state: ContainerStatus) -> TaskStatus {
        if self.is_terminal() {
            return TaskStatus::Stopped;
        }
        if self.is_steady(steady_state) {
            return TaskStatus::Running;
        }
        match self {
            ContainerStatus::None | ContainerStatus::Pulled => TaskStatus::None,
            _ => TaskStatus::Created,
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerStatus::None => "NONE",
            ContainerStatus::Pulled => "PULLED",
            ContainerStatus::Created => "CREATED",
            ContainerStatus::Running => "RUNNING",
            ContainerStatus::ResourcesProvisioned => "RESOURCES_PROVISIONED",
            ContainerStatus::Stopped => "STOPPED",
            ContainerStatus::Dead => "DEAD",
        };
        f.write_str(s)
    }
}

/// Task lifecycle status, in lifecycle order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    None,
    Created,
    Running,
    Stopped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        self == TaskStatus::Stopped
    }

    /// The container status a task-level desired status asks for.
    pub fn container_status(self) -> ContainerStatus {
        match self {
            TaskStatus::None => ContainerStatus::None,
            TaskStatus::Created => ContainerStatus::Created,
            TaskStatus::Running => ContainerStatus::Running,
            TaskStatus::Stopped => ContainerStatus::Stopped,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::None => "NONE",
            TaskStatus::Created => "CREATED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Status of a network interface attachment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentStatus {
    #[default]
    None,
    Attached,
    Detached,
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttachmentStatus::None => "NONE",
            AttachmentStatus::Attached => "ATTACHED",
            AttachmentStatus::Detached => "DETACHED",
        };
        f.write_str(s)
    }
}

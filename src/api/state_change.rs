// src/api/state_change.rs

//! Events the engine reports outward.

use super::status::{AttachmentStatus, ContainerStatus, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStateChange {
    pub task_arn: String,
    pub container_name: String,
    pub status: ContainerStatus,
    pub runtime_id: Option<String>,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStateChange {
    pub task_arn: String,
    pub status: TaskStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentStateChange {
    pub task_arn: String,
    pub attachment_arn: String,
    pub mac_address: String,
    pub status: AttachmentStatus,
}

/// A state change delivered on the outbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Container(ContainerStateChange),
    Task(TaskStateChange),
    Attachment(AttachmentStateChange),
}

impl StateChange {
    pub fn task_arn(&self) -> &str {
        match self {
            StateChange::Container(c) => &c.task_arn,
            StateChange::Task(t) => &t.task_arn,
            StateChange::Attachment(a) => &a.task_arn,
        }
    }
}

// src/api/mod.rs

//! Data model shared by every part of the engine.
//!
//! - [`status`]: container/task/attachment statuses and their ordering.
//! - [`container`] and [`task`]: the entities the engine drives.
//! - [`attachment`]: network interfaces attached to tasks.
//! - [`state_change`]: what the engine reports outward.

pub mod attachment;
pub mod container;
pub mod state_change;
pub mod status;
pub mod task;

pub use attachment::{EniAttachment, normalize_mac};
pub use container::{
    Container, ContainerDependency, ContainerKind, NETWORK_SETUP_CONTAINER_NAME,
};
pub use state_change::{
    AttachmentStateChange, ContainerStateChange, StateChange, TaskStateChange,
};
pub use status::{AttachmentStatus, ContainerStatus, TaskStatus};
pub use task::Task;

// src/api/container.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::status::{ContainerStatus, TaskStatus};

/// Name given to the implicit network-setup container of a task.
pub const NETWORK_SETUP_CONTAINER_NAME: &str = "~internal~pause";

/// A dependency of one container on another container of the same task.
///
/// The dependent container may not move past `dependent_status` until the
/// container named `container_name` has reached `satisfied_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDependency {
    pub container_name: String,
    pub satisfied_status: ContainerStatus,
    pub dependent_status: ContainerStatus,
}

impl ContainerDependency {
    pub fn new(
        container_name: impl Into<String>,
        satisfied_status: ContainerStatus,
        dependent_status: ContainerStatus,
    ) -> Self {
        Self {
            container_name: container_name.into(),
            satisfied_status,
            dependent_status,
        }
    }
}

/// What role a container plays inside its task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// A container defined by the user.
    #[default]
    Normal,
    /// The engine-managed container holding the task's network namespace.
    NetworkSetup,
}

/// A single container of a task.
///
/// `known_status` and `sent_status` are owned by the managed task driving the
/// container; everything else is desired configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,

    #[serde(default = "default_essential")]
    pub essential: bool,

    #[serde(default)]
    pub kind: ContainerKind,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// User labels; engine labels are merged in at create time.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Containers this one links to. Linked containers must be running
    /// before this one starts.
    #[serde(default)]
    pub links: Vec<String>,

    /// Containers whose volumes this one mounts. They must exist before
    /// this one is created.
    #[serde(default)]
    pub volumes_from: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<ContainerDependency>,

    /// Network mode passed to the runtime (`none`, `container:<id>`, ...).
    #[serde(default)]
    pub network_mode: Option<String>,

    #[serde(default = "default_desired")]
    pub desired_status: ContainerStatus,

    #[serde(default)]
    pub known_status: ContainerStatus,

    /// Last status reported outward.
    #[serde(default)]
    pub sent_status: ContainerStatus,

    /// Name the container is created under in the runtime.
    #[serde(default)]
    pub runtime_name: Option<String>,

    /// Identifier assigned by the runtime once created.
    #[serde(default)]
    pub runtime_id: Option<String>,

    #[serde(default)]
    pub exit_code: Option<i32>,

    /// Last error hit while applying a transition.
    #[serde(default)]
    pub applying_error: Option<String>,
}

fn default_essential() -> bool {
    true
}

fn default_desired() -> ContainerStatus {
    ContainerStatus::Running
}

impl Container {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            essential: true,
            kind: ContainerKind::Normal,
            command: Vec::new(),
            environment: BTreeMap::new(),
            labels: BTreeMap::new(),
            links: Vec::new(),
            volumes_from: Vec::new(),
            dependencies: Vec::new(),
            network_mode: None,
            desired_status: ContainerStatus::Running,
            known_status: ContainerStatus::None,
            sent_status: ContainerStatus::None,
            runtime_name: None,
            runtime_id: None,
            exit_code: None,
            applying_error: None,
        }
    }

    /// Build the network-setup container for a task.
    pub fn network_setup(image: impl Into<String>) -> Self {
        let mut container = Self::new(NETWORK_SETUP_CONTAINER_NAME, image);
        container.kind = ContainerKind::NetworkSetup;
        container.network_mode = Some("none".to_string());
        container
    }

    /// The status at which this container counts as running.
    pub fn steady_state(&self) -> ContainerStatus {
        match self.kind {
            ContainerKind::Normal => ContainerStatus::Running,
            ContainerKind::NetworkSetup => ContainerStatus::ResourcesProvisioned,
        }
    }

    /// Internal containers are managed by the engine and never reported.
    pub fn is_internal(&self) -> bool {
        self.kind != ContainerKind::Normal
    }

    /// The status the engine is driving this container toward.
    ///
    /// A desired RUNNING means "reach steady state".
    pub fn target_status(&self) -> ContainerStatus {
        if self.desired_status == ContainerStatus::Running {
            self.steady_state()
        } else {
            self.desired_status
        }
    }

    pub fn is_known_steady(&self) -> bool {
        self.known_status.is_steady(self.steady_state())
    }

    pub fn is_at_target(&self) -> bool {
        self.known_status >= self.target_status()
    }

    /// Apply a reported status if it moves the container forward.
    ///
    /// Returns `false` (and changes nothing) for duplicate or regressing
    /// reports.
    pub fn advance_known_status(&mut self, status: ContainerStatus) -> bool {
        if !status.is_forward_of(self.known_status) {
            return false;
        }
        self.known_status = status;
        true
    }

    /// Ask the container to stop. Never lowers an already-terminal desire.
    pub fn desire_stopped(&mut self) {
        if self.desired_status < ContainerStatus::Stopped {
            self.desired_status = ContainerStatus::Stopped;
        }
    }

    pub fn task_status(&self) -> TaskStatus {
        self.known_status.task_status(self.steady_state())
    }

    /// Whether this container's status change should be reported outward.
    ///
    /// Only RUNNING and STOPPED are reportable, and each at most once.
    pub fn pending_report(&self) -> Option<ContainerStatus> {
        if self.is_internal() {
            return None;
        }
        let reportable = if self.known_status.is_terminal() {
            ContainerStatus::Stopped
        } else if self.known_status >= ContainerStatus::Running {
            ContainerStatus::Running
        } else {
            return None;
        };
        reportable.is_forward_of(self.sent_status).then_some(reportable)
    }
}

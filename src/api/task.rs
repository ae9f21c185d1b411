// src/api/task.rs

use serde::{Deserialize, Serialize};

use super::attachment::EniAttachment;
use super::container::{Container, ContainerDependency, ContainerKind};
use super::status::{ContainerStatus, TaskStatus};

/// A group of containers managed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub arn: String,

    #[serde(default)]
    pub family: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, rename = "container")]
    pub containers: Vec<Container>,

    #[serde(default = "default_desired")]
    pub desired_status: TaskStatus,

    #[serde(default)]
    pub known_status: TaskStatus,

    /// Last status reported outward.
    #[serde(default)]
    pub sent_status: TaskStatus,

    /// Sequence number of the message that started this task (0 = none).
    #[serde(default)]
    pub start_sequence_number: u64,

    /// Sequence number of the message that stopped this task (0 = none).
    #[serde(default)]
    pub stop_sequence_number: u64,

    #[serde(default)]
    pub eni: Option<EniAttachment>,
}

fn default_desired() -> TaskStatus {
    TaskStatus::Running
}

impl Task {
    pub fn new(arn: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            family: String::new(),
            version: String::new(),
            containers: Vec::new(),
            desired_status: TaskStatus::Running,
            known_status: TaskStatus::None,
            sent_status: TaskStatus::None,
            start_sequence_number: 0,
            stop_sequence_number: 0,
            eni: None,
        }
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut Container> {
        self.containers.iter_mut().find(|c| c.name == name)
    }

    pub fn network_setup_container(&self) -> Option<&Container> {
        self.containers
            .iter()
            .find(|c| c.kind == ContainerKind::NetworkSetup)
    }

    /// Add the network-setup container if the task carries an ENI and does
    /// not have one yet. Every other container is made to depend on it.
    pub fn add_network_setup_container(&mut self, image: &str) {
        if self.eni.is_none() || self.network_setup_container().is_some() {
            return;
        }
        let setup = Container::network_setup(image);
        let setup_name = setup.name.clone();
        for container in self.containers.iter_mut() {
            let already = container
                .dependencies
                .iter()
                .any(|d| d.container_name == setup_name);
            if !already {
                container.dependencies.push(ContainerDependency::new(
                    setup_name.clone(),
                    ContainerStatus::ResourcesProvisioned,
                    ContainerStatus::Pulled,
                ));
            }
        }
        self.containers.push(setup);
    }

    /// Raise the desired status. Lower or equal requests are ignored.
    pub fn set_desired_status(&mut self, status: TaskStatus) -> bool {
        if status <= self.desired_status {
            return false;
        }
        self.desired_status = status;
        true
    }

    /// Propagate desired status between the task and its containers.
    ///
    /// A stopped essential container drives the whole task to STOPPED, and a
    /// task desired STOPPED drives every container to STOPPED.
    pub fn update_desired_status(&mut self) {
        let essential_stopped = self
            .containers
            .iter()
            .any(|c| c.essential && c.known_status.is_terminal());
        if essential_stopped {
            self.set_desired_status(TaskStatus::Stopped);
        }
        if self.desired_status.is_terminal() {
            for container in self.containers.iter_mut() {
                container.desire_stopped();
            }
        }
    }

    /// The status implied by the containers' known statuses.
    ///
    /// STOPPED only once every container is terminal; otherwise the earliest
    /// status among the containers that are still alive.
    pub fn aggregate_known_status(&self) -> TaskStatus {
        if self.containers.is_empty() {
            return self.known_status;
        }
        if self.containers.iter().all(|c| c.known_status.is_terminal()) {
            return TaskStatus::Stopped;
        }
        self.containers
            .iter()
            .filter(|c| !c.known_status.is_terminal())
            .map(Container::task_status)
            .min()
            .unwrap_or(TaskStatus::None)
    }

    /// Move the known status forward to the aggregate, if that is forward.
    pub fn update_known_status(&mut self) -> bool {
        let aggregate = self.aggregate_known_status();
        if aggregate > self.known_status {
            self.known_status = aggregate;
            true
        } else {
            false
        }
    }

    /// Whether a task-level state change is waiting to be reported.
    ///
    /// Only RUNNING and STOPPED are reported.
    pub fn pending_report(&self) -> Option<TaskStatus> {
        match self.known_status {
            TaskStatus::Running | TaskStatus::Stopped if self.known_status > self.sent_status => {
                Some(self.known_status)
            }
            _ => None,
        }
    }

    /// Every container is at its target status.
    pub fn all_at_target(&self) -> bool {
        self.containers.iter().all(Container::is_at_target)
    }
}

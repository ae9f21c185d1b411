#![allow(dead_code)]

use taskengine::api::{
    Container, ContainerDependency, ContainerStatus, EniAttachment, Task, TaskStatus,
};

/// Builder for `Task` to simplify test setup.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(arn: &str) -> Self {
        let mut task = Task::new(arn);
        task.family = "family".to_string();
        task.version = "1".to_string();
        Self { task }
    }

    pub fn family(mut self, family: &str, version: &str) -> Self {
        self.task.family = family.to_string();
        self.task.version = version.to_string();
        self
    }

    pub fn container(mut self, container: Container) -> Self {
        self.task.containers.push(container);
        self
    }

    /// Shorthand for an essential container with no dependencies.
    pub fn simple(self, name: &str, image: &str) -> Self {
        self.container(ContainerBuilder::new(name, image).build())
    }

    pub fn desired(mut self, status: TaskStatus) -> Self {
        self.task.desired_status = status;
        self
    }

    pub fn start_sequence(mut self, n: u64) -> Self {
        self.task.start_sequence_number = n;
        self
    }

    pub fn stop_sequence(mut self, n: u64) -> Self {
        self.task.stop_sequence_number = n;
        self
    }

    pub fn eni(mut self, mac: &str) -> Self {
        let mut eni = EniAttachment::new(
            self.task.arn.clone(),
            format!("{}/attachment", self.task.arn),
            mac,
        );
        eni.ipv4_addresses = vec!["10.0.0.10".to_string()];
        self.task.eni = Some(eni);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for `Container`.
pub struct ContainerBuilder {
    container: Container,
}

impl ContainerBuilder {
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            container: Container::new(name, image),
        }
    }

    pub fn essential(mut self, essential: bool) -> Self {
        self.container.essential = essential;
        self
    }

    pub fn link(mut self, target: &str) -> Self {
        self.container.links.push(target.to_string());
        self
    }

    pub fn volumes_from(mut self, source: &str) -> Self {
        self.container.volumes_from.push(source.to_string());
        self
    }

    pub fn depends_on(
        mut self,
        target: &str,
        satisfied: ContainerStatus,
        dependent: ContainerStatus,
    ) -> Self {
        self.container
            .dependencies
            .push(ContainerDependency::new(target, satisfied, dependent));
        self
    }

    /// The usual "start after `target` runs" dependency.
    pub fn after(self, target: &str) -> Self {
        self.depends_on(target, ContainerStatus::Running, ContainerStatus::Created)
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.container
            .labels
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn command(mut self, args: &[&str]) -> Self {
        self.container.command = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn known(mut self, status: ContainerStatus) -> Self {
        self.container.known_status = status;
        self
    }

    pub fn runtime_id(mut self, id: &str) -> Self {
        self.container.runtime_id = Some(id.to_string());
        self
    }

    pub fn runtime_name(mut self, name: &str) -> Self {
        self.container.runtime_name = Some(name.to_string());
        self
    }

    pub fn build(self) -> Container {
        self.container
    }
}

// src/engine/state.rs

//! Engine-wide registry shared by the dispatcher, the task workers, the
//! public query API and the attachment watcher.
//!
//! The registry indexes task snapshots and worker inboxes; it never holds a
//! task's live state. Each worker publishes a fresh snapshot after every
//! step. The lock is never held across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::api::{AttachmentStatus, EniAttachment, Task, normalize_mac};
use crate::statemanager::EngineSnapshot;

use super::task_core::TaskInput;

/// Which container of which task a runtime id belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub task_arn: String,
    pub container_name: String,
}

/// Result of trying to admit a task.
#[derive(Debug)]
pub(crate) enum Admission {
    /// The task was new and is now registered.
    Admitted,
    /// A task with this ARN exists; its worker inbox if it is managed.
    Existing(Option<mpsc::Sender<TaskInput>>),
}

#[derive(Debug, Default)]
struct Registry {
    tasks: BTreeMap<String, Task>,
    workers: HashMap<String, mpsc::Sender<TaskInput>>,
    runtime_ids: HashMap<String, ContainerRef>,
    attachments: HashMap<String, EniAttachment>,
    stops: HashMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct EngineState {
    inner: Mutex<Registry>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn task_by_arn(&self, arn: &str) -> Option<Task> {
        self.registry().tasks.get(arn).cloned()
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.registry().tasks.values().cloned().collect()
    }

    /// Whether the task has a live worker.
    pub fn is_managed(&self, arn: &str) -> bool {
        self.registry().workers.contains_key(arn)
    }

    pub fn container_owner(&self, runtime_id: &str) -> Option<ContainerRef> {
        self.registry().runtime_ids.get(runtime_id).cloned()
    }

    /// Owner of a runtime id together with the owning worker's inbox.
    pub(crate) fn route(&self, runtime_id: &str) -> Option<(ContainerRef, mpsc::Sender<TaskInput>)> {
        let registry = self.registry();
        let owner = registry.runtime_ids.get(runtime_id)?;
        let worker = registry.workers.get(&owner.task_arn)?;
        Some((owner.clone(), worker.clone()))
    }

    /// Register `task` unless its ARN is already known.
    ///
    /// `worker` is `None` for tasks kept only for queries.
    pub(crate) fn admit(&self, task: &Task, worker: Option<mpsc::Sender<TaskInput>>) -> Admission {
        let mut registry = self.registry();
        if registry.tasks.contains_key(&task.arn) {
            return Admission::Existing(registry.workers.get(&task.arn).cloned());
        }

        registry.tasks.insert(task.arn.clone(), task.clone());
        if let Some(worker) = worker {
            registry.workers.insert(task.arn.clone(), worker);
        }
        if let Some(ref eni) = task.eni {
            registry
                .attachments
                .entry(normalize_mac(&eni.mac_address))
                .or_insert_with(|| eni.clone());
        }
        index_runtime_ids(&mut registry, task);
        Admission::Admitted
    }

    /// Replace a task's snapshot and index any newly known runtime ids.
    pub(crate) fn publish(&self, task: &Task) {
        let mut registry = self.registry();
        if !registry.tasks.contains_key(&task.arn) {
            return;
        }
        index_runtime_ids(&mut registry, task);
        registry.tasks.insert(task.arn.clone(), task.clone());
    }

    /// Record the stop sequence number applied to a task. Returns false if
    /// the task already has one, or is unknown or already stopped: its
    /// worker has passed the point where a stop is marked done.
    pub(crate) fn register_stop(&self, arn: &str, sequence: u64) -> bool {
        let mut registry = self.registry();
        let stopped = registry
            .tasks
            .get(arn)
            .is_none_or(|task| task.known_status.is_terminal());
        if stopped || registry.stops.contains_key(arn) {
            return false;
        }
        registry.stops.insert(arn.to_string(), sequence);
        true
    }

    pub(crate) fn take_stop(&self, arn: &str) -> Option<u64> {
        self.registry().stops.remove(arn)
    }

    /// Forget a task entirely. Returns the stop sequence number still
    /// registered for it, if any.
    pub(crate) fn remove_task(&self, arn: &str) -> Option<u64> {
        let mut registry = self.registry();
        registry.tasks.remove(arn);
        registry.workers.remove(arn);
        registry.runtime_ids.retain(|_, owner| owner.task_arn != arn);
        registry.attachments.retain(|_, eni| eni.task_arn != arn);
        registry.stops.remove(arn)
    }

    pub fn add_attachment(&self, attachment: EniAttachment) {
        let mac = normalize_mac(&attachment.mac_address);
        self.registry().attachments.insert(mac, attachment);
    }

    pub fn attachment_by_mac(&self, mac: &str) -> Option<EniAttachment> {
        self.registry().attachments.get(&normalize_mac(mac)).cloned()
    }

    /// Mark an attachment as attached and reported. Returns false if it is
    /// unknown.
    pub fn mark_attachment_sent(&self, mac: &str) -> bool {
        match self.registry().attachments.get_mut(&normalize_mac(mac)) {
            Some(attachment) => {
                attachment.status = AttachmentStatus::Attached;
                attachment.sent = true;
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let registry = self.registry();
        let tasks = registry
            .tasks
            .values()
            .map(|task| {
                let mut task = task.clone();
                if let Some(ref mut eni) = task.eni {
                    if let Some(live) = registry.attachments.get(&normalize_mac(&eni.mac_address)) {
                        *eni = live.clone();
                    }
                }
                task
            })
            .collect();
        let attachments = registry.attachments.values().cloned().collect();
        EngineSnapshot { tasks, attachments }
    }
}

fn index_runtime_ids(registry: &mut Registry, task: &Task) {
    for container in task.containers.iter() {
        if let Some(ref id) = container.runtime_id {
            registry.runtime_ids.insert(
                id.clone(),
                ContainerRef {
                    task_arn: task.arn.clone(),
                    container_name: container.name.clone(),
                },
            );
        }
    }
}

// src/engine/task_engine.rs

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::api::{StateChange, Task, TaskStateChange, TaskStatus};
use crate::config::EngineConfig;
use crate::dag::validate_dependencies;
use crate::errors::{EngineError, Result};
use crate::network::NetworkSetup;
use crate::runtime::{ContainerRuntime, RuntimeVersion};
use crate::statemanager::{EngineSnapshot, StateSaver};

use super::context::EngineContext;
use super::dispatcher::dispatch_runtime_events;
use super::managed_task::ManagedTask;
use super::state::{Admission, EngineState};
use super::task_core::TaskInput;

/// The task engine.
///
/// Owns the registry of tasks, admits new tasks, routes runtime events to
/// the worker owning each container and exposes the outbound state-change
/// channel.
///
/// Typical wiring:
///
/// 1. [`TaskEngine::new`] with the runtime, saver and network collaborators.
/// 2. [`TaskEngine::state_change_events`] to take the outbound receiver.
/// 3. [`TaskEngine::init`] to probe the runtime, restore saved state and
///    subscribe to runtime events.
/// 4. [`TaskEngine::add_task`] for every desired-state update.
pub struct TaskEngine {
    ctx: Arc<EngineContext>,
    events_rx: Mutex<Option<mpsc::Receiver<StateChange>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl TaskEngine {
    pub fn new(
        config: EngineConfig,
        runtime: Arc<dyn ContainerRuntime>,
        saver: Arc<dyn StateSaver>,
        network: Arc<dyn NetworkSetup>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.state_change_buffer);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = EngineContext::new(
            config,
            runtime,
            saver,
            network,
            Arc::new(EngineState::new()),
            events_tx,
            shutdown_rx,
        );

        Self {
            ctx: Arc::new(ctx),
            events_rx: Mutex::new(Some(events_rx)),
            shutdown_tx,
        }
    }

    /// Bring the engine up.
    ///
    /// Probes the runtime version, loads saved state, subscribes to runtime
    /// events and re-admits any restored tasks. Failing to load state or to
    /// subscribe is terminal.
    pub async fn init(&self) -> Result<()> {
        self.probe_runtime_version().await;

        let restored = self
            .ctx
            .saver
            .load()
            .map_err(|e| EngineError::StateLoad(format!("{e:#}")))?;

        let events = self
            .ctx
            .runtime
            .subscribe_events()
            .await
            .map_err(|e| EngineError::EventStream(e.to_string()))?;

        tokio::spawn(dispatch_runtime_events(
            Arc::clone(&self.ctx.state),
            events,
            self.ctx.shutdown.clone(),
        ));

        if let Some(snapshot) = restored {
            self.restore(snapshot).await?;
        }

        info!(
            concurrent_pull = self.ctx.concurrent_pull_enabled(),
            "task engine initialised"
        );
        Ok(())
    }

    /// Decide whether image pulls may run concurrently.
    async fn probe_runtime_version(&self) {
        let minimum = self.ctx.config.concurrent_pull_min_version;
        let enabled = match self.ctx.runtime.version().await {
            Ok(raw) => match raw.parse::<RuntimeVersion>() {
                Ok(version) => {
                    info!(%version, %minimum, "runtime version detected");
                    version >= minimum
                }
                Err(err) => {
                    warn!(version = %raw, error = %err, "unparseable runtime version; pulling serially");
                    false
                }
            },
            Err(err) => {
                warn!(error = %err, "runtime version unavailable; pulling serially");
                false
            }
        };
        self.ctx.set_concurrent_pull(enabled);
    }

    /// Re-admit tasks from a saved snapshot.
    ///
    /// Each restored container with a runtime id is checked against the
    /// runtime first, so status changes missed while the engine was down
    /// are applied before the task's worker starts.
    async fn restore(&self, snapshot: EngineSnapshot) -> Result<()> {
        info!(tasks = snapshot.tasks.len(), "restoring saved tasks");

        for mut task in snapshot.tasks {
            for container in task.containers.iter_mut() {
                let Some(ref id) = container.runtime_id else {
                    continue;
                };
                let limit = self.ctx.config.timeouts.inspect;
                let describe = self.ctx.runtime.describe_status(id);
                let Ok((status, metadata)) = time::timeout(limit, describe).await else {
                    warn!(
                        task = %task.arn,
                        container = %container.name,
                        "describe timed out during restore; keeping saved status"
                    );
                    continue;
                };
                if status.is_forward_of(container.known_status) {
                    info!(
                        task = %task.arn,
                        container = %container.name,
                        known = %container.known_status,
                        observed = %status,
                        "applying status observed while down"
                    );
                    container.known_status = status;
                    if metadata.exit_code.is_some() {
                        container.exit_code = metadata.exit_code;
                    }
                }
            }
            task.update_known_status();
            self.add_task(task).await?;
        }

        for attachment in snapshot.attachments {
            self.ctx.state.add_attachment(attachment);
        }
        Ok(())
    }

    /// Admit a task, or merge an update into the task with the same ARN.
    ///
    /// An invalid task (dependency cycle, unknown dependency, duplicate or
    /// missing containers) is recorded as STOPPED, reported once, and never
    /// managed. Validation problems are not returned as errors.
    pub async fn add_task(&self, mut task: Task) -> Result<()> {
        task.add_network_setup_container(&self.ctx.config.pause_image);

        if let Err(err) = validate_dependencies(&task) {
            return self.reject(task, err).await;
        }

        task.update_desired_status();
        let (inbox_tx, inbox_rx) = mpsc::channel(self.ctx.config.task_inbox_size);

        match self.ctx.state.admit(&task, Some(inbox_tx.clone())) {
            Admission::Admitted => {
                info!(
                    task = %task.arn,
                    containers = task.containers.len(),
                    desired = %task.desired_status,
                    start_sequence = task.start_sequence_number,
                    "task admitted"
                );
                self.register_stop(&task);
                self.ctx.save();
                let worker = ManagedTask::new(task, Arc::clone(&self.ctx), inbox_tx);
                tokio::spawn(worker.run(inbox_rx));
            }
            Admission::Existing(Some(worker)) => {
                debug!(task = %task.arn, desired = %task.desired_status, "merging update into managed task");
                self.register_stop(&task);
                let update = TaskInput::DesiredStatus {
                    status: task.desired_status,
                    stop_sequence_number: task.stop_sequence_number,
                };
                if worker.send(update).await.is_err() {
                    debug!(task = %task.arn, "task worker gone; update dropped");
                }
            }
            Admission::Existing(None) => {
                debug!(task = %task.arn, "task is not managed; update ignored");
            }
        }
        Ok(())
    }

    /// Hold later starts until this stop has completed.
    fn register_stop(&self, task: &Task) {
        let sequence = task.stop_sequence_number;
        if task.desired_status.is_terminal()
            && sequence > 0
            && self.ctx.state.register_stop(&task.arn, sequence)
        {
            debug!(task = %task.arn, sequence, "stop registered for sequencing");
            self.ctx.stop_group.add(sequence);
        }
    }

    async fn reject(&self, mut task: Task, err: EngineError) -> Result<()> {
        error!(task = %task.arn, error = %err, "task rejected");

        task.desired_status = TaskStatus::Stopped;
        task.known_status = TaskStatus::Stopped;
        for container in task.containers.iter_mut() {
            container.desire_stopped();
        }

        if let Admission::Existing(_) = self.ctx.state.admit(&task, None) {
            debug!(task = %task.arn, "rejected update for known task ignored");
            return Ok(());
        }

        task.sent_status = TaskStatus::Stopped;
        self.ctx.state.publish(&task);
        self.ctx
            .events_tx
            .send(StateChange::Task(TaskStateChange {
                task_arn: task.arn.clone(),
                status: TaskStatus::Stopped,
                reason: Some(err.to_string()),
            }))
            .await
            .map_err(|_| EngineError::ChannelClosed("state change"))
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.ctx.state.list_tasks()
    }

    pub fn get_task_by_arn(&self, arn: &str) -> Option<Task> {
        self.ctx.state.task_by_arn(arn)
    }

    /// Like [`TaskEngine::get_task_by_arn`], for callers that treat a
    /// missing task as an error.
    pub fn task(&self, arn: &str) -> Result<Task> {
        self.get_task_by_arn(arn)
            .ok_or_else(|| EngineError::TaskNotFound(arn.to_string()))
    }

    /// Whether the task has a live worker.
    pub fn is_managed(&self, arn: &str) -> bool {
        self.ctx.state.is_managed(arn)
    }

    /// Take the outbound state-change receiver. Only the first call gets it.
    pub fn state_change_events(&self) -> Option<mpsc::Receiver<StateChange>> {
        self.events_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Another writer for the outbound channel, e.g. the attachment watcher.
    pub fn state_change_sender(&self) -> mpsc::Sender<StateChange> {
        self.ctx.events_tx.clone()
    }

    /// The shared registry.
    pub fn state(&self) -> Arc<EngineState> {
        Arc::clone(&self.ctx.state)
    }

    pub fn concurrent_pull_enabled(&self) -> bool {
        self.ctx.concurrent_pull_enabled()
    }

    /// Receiver that flips to `true` on shutdown, for watchers run next to
    /// the engine.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop the dispatcher, every worker and any watcher holding a
    /// [`TaskEngine::shutdown_signal`]. In-flight runtime calls are left to
    /// finish or time out.
    pub fn shutdown(&self) {
        info!("task engine shutting down");
        self.shutdown_tx.send_replace(true);
    }
}

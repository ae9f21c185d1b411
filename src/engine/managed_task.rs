// src/engine/managed_task.rs

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{Task, TaskStatus};
use crate::network::release_config;
use crate::runtime::ContainerMetadata;

use super::actions::{self, ActionRequest};
use super::context::EngineContext;
use super::task_core::{TaskCommand, TaskCore, TaskInput, TaskPhase, TaskStep};

/// Async worker driving one task.
///
/// This is the IO shell around [`TaskCore`]: it owns the task's private
/// inbox, runs the commands the core returns, publishes snapshots to the
/// registry and forwards state changes outward. All mutation of the task
/// happens on this worker, one input at a time.
pub(crate) struct ManagedTask {
    core: TaskCore,
    ctx: Arc<EngineContext>,
    inbox_tx: mpsc::Sender<TaskInput>,
    desired_tx: watch::Sender<TaskStatus>,
}

impl ManagedTask {
    pub fn new(task: Task, ctx: Arc<EngineContext>, inbox_tx: mpsc::Sender<TaskInput>) -> Self {
        let (desired_tx, _) = watch::channel(task.desired_status);
        let core = TaskCore::new(task, &ctx.config);
        Self {
            core,
            ctx,
            inbox_tx,
            desired_tx,
        }
    }

    /// Main loop. Returns once the task has been cleaned up, or on shutdown.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<TaskInput>) {
        let ctx = Arc::clone(&self.ctx);
        let arn = self.core.task().arn.clone();
        let mut shutdown = ctx.shutdown.clone();

        let start_sequence = self.core.task().start_sequence_number;
        let gate = ctx.stop_group.wait(start_sequence);
        tokio::pin!(gate);

        let period = ctx.config.steady_state_verify_interval;
        let mut verify = time::interval_at(Instant::now() + period, period);
        verify.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(task = %arn, start_sequence, "managed task started");
        let step = self.core.start();
        self.apply(step).await;

        while !self.core.task().known_status.is_terminal() {
            if *shutdown.borrow() {
                info!(task = %arn, "shutdown requested; worker exiting");
                return;
            }

            let phase = self.core.phase();
            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(input) => {
                        let step = self.core.step(input);
                        self.apply(step).await;
                    }
                    None => {
                        debug!(task = %arn, "inbox closed; worker exiting");
                        return;
                    }
                },
                _ = &mut gate, if phase == TaskPhase::Waiting => {
                    info!(task = %arn, start_sequence, "earlier stops complete; starting task");
                    let step = self.core.open_gate();
                    self.apply(step).await;
                }
                _ = verify.tick(), if phase == TaskPhase::Steady => {
                    self.verify_steady_state().await;
                }
                _ = shutdown.changed() => {
                    info!(task = %arn, "shutdown requested; worker exiting");
                    return;
                }
            }
        }

        if let Some(sequence) = ctx.state.take_stop(&arn) {
            ctx.stop_group.done(sequence);
        }
        info!(task = %arn, "task stopped");

        self.cleanup(inbox, shutdown).await;
    }

    /// Publish, run the step's commands, then report its state changes.
    async fn apply(&mut self, step: TaskStep) {
        self.ctx.state.publish(self.core.task());
        self.desired_tx.send_replace(self.core.task().desired_status);

        for command in step.commands {
            self.execute(command);
        }

        for change in step.state_changes {
            debug!(?change, "emitting state change");
            if self.ctx.events_tx.send(change).await.is_err() {
                warn!(task = %self.core.task().arn, "state change channel closed");
            }
        }
    }

    fn execute(&self, command: TaskCommand) {
        match command {
            TaskCommand::Execute {
                container,
                transition,
            } => {
                let request = ActionRequest {
                    task: self.core.task().clone(),
                    container: container.clone(),
                    transition,
                    desired: self.desired_tx.subscribe(),
                };
                let ctx = Arc::clone(&self.ctx);
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let result = actions::execute(&ctx, request).await;
                    let _ = tx
                        .send(TaskInput::ActionFinished {
                            container,
                            transition,
                            result,
                        })
                        .await;
                });
            }
            TaskCommand::ScheduleRetry { container } => {
                let delay = self.ctx.config.transition_retry_delay;
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    time::sleep(delay).await;
                    let _ = tx.send(TaskInput::RetryReady { container }).await;
                });
            }
            TaskCommand::Reconcile {
                container,
                runtime_id,
            } => {
                let ctx = Arc::clone(&self.ctx);
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let limit = ctx.config.timeouts.inspect;
                    let describe = ctx.runtime.describe_status(&runtime_id);
                    let (status, metadata) = match time::timeout(limit, describe).await {
                        Ok(observed) => observed,
                        Err(_) => (
                            Default::default(),
                            ContainerMetadata {
                                error: Some(format!("describe timed out after {limit:?}")),
                                ..ContainerMetadata::default()
                            },
                        ),
                    };
                    let _ = tx
                        .send(TaskInput::Reconciled {
                            container,
                            status,
                            metadata,
                        })
                        .await;
                });
            }
            TaskCommand::Persist => self.ctx.save(),
        }
    }

    /// Ask the runtime for every live container's status and apply any
    /// forward drift, such as a container that died without an event.
    async fn verify_steady_state(&mut self) {
        let limit = self.ctx.config.timeouts.inspect;
        let arn = self.core.task().arn.clone();
        debug!(task = %arn, "verifying steady state");

        for (name, runtime_id, known) in self.core.steady_checks() {
            let describe = self.ctx.runtime.describe_status(&runtime_id);
            let (status, metadata) = match time::timeout(limit, describe).await {
                Ok(observed) => observed,
                Err(_) => {
                    warn!(task = %arn, container = %name, "describe timed out during verification");
                    continue;
                }
            };
            if !status.is_forward_of(known) {
                continue;
            }

            warn!(
                task = %arn,
                container = %name,
                %known,
                observed = %status,
                "container drifted from known status"
            );
            let step = self.core.step(TaskInput::ContainerEvent {
                container: name,
                status,
                metadata,
            });
            self.apply(step).await;
        }
    }

    /// Wait out the cleanup delay, remove the task's containers and purge it.
    ///
    /// The inbox keeps being drained the whole time: late or duplicate
    /// events for a stopped task are read and discarded, so nothing sending
    /// to this task can block on it.
    async fn cleanup(self, mut inbox: mpsc::Receiver<TaskInput>, mut shutdown: watch::Receiver<bool>) {
        let ManagedTask {
            core, ctx, inbox_tx, ..
        } = self;
        drop(inbox_tx);

        let task = core.task().clone();
        let arn = task.arn.clone();
        info!(task = %arn, wait = ?ctx.config.task_cleanup_wait, "waiting before cleanup");

        let work = cleanup_task(Arc::clone(&ctx), task);
        tokio::pin!(work);

        let mut draining = true;
        loop {
            tokio::select! {
                _ = &mut work => break,
                msg = inbox.recv(), if draining => match msg {
                    Some(input) => debug!(task = %arn, ?input, "discarding input for stopped task"),
                    None => draining = false,
                },
                _ = shutdown.changed() => {
                    info!(task = %arn, "shutdown requested during cleanup");
                    return;
                }
            }
        }
    }
}

async fn cleanup_task(ctx: Arc<EngineContext>, task: Task) {
    time::sleep(ctx.config.task_cleanup_wait).await;

    if task.network_setup_container().is_some() {
        match release_config(&task, ctx.config.block_instance_metadata) {
            Ok(config) => {
                if let Err(err) = ctx.network.release_ip_resource(&config).await {
                    warn!(task = %task.arn, error = %err, "releasing ip resources failed");
                }
            }
            Err(err) => warn!(task = %task.arn, error = %err, "cannot build release config"),
        }
    }

    for container in task.containers.iter().filter(|c| c.runtime_id.is_some()) {
        match actions::remove(&ctx, container, ctx.config.timeouts.remove).await {
            Ok(()) => debug!(task = %task.arn, container = %container.name, "container removed"),
            Err(err) => warn!(
                task = %task.arn,
                container = %container.name,
                error = %err,
                "removing container failed"
            ),
        }
    }

    if let Some(sequence) = ctx.state.remove_task(&task.arn) {
        ctx.stop_group.done(sequence);
    }
    ctx.save();
    info!(task = %task.arn, "task cleaned up");
}

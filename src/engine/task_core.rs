// src/engine/task_core.rs

//! Pure per-task state machine.
//!
//! [`TaskCore`] owns one task's containers and decides what happens next.
//! It consumes [`TaskInput`]s and returns a [`TaskStep`] describing the
//! commands the async worker must run and the state changes it must report.
//! It has no channels and performs no IO, so every ordering and retry rule
//! can be tested synchronously.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info};

use crate::api::{
    ContainerStateChange, ContainerStatus, StateChange, Task, TaskStateChange, TaskStatus,
};
use crate::config::{EngineConfig, Timeouts};
use crate::dag::dependencies_are_resolved;
use crate::runtime::{ContainerMetadata, RuntimeError};

use super::transition::{NextStep, Transition, next_step};

/// What an action reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Done(ActionOutput),
    /// The action was dropped before it reached the runtime.
    Skipped,
    Failed(RuntimeError),
}

/// Facts learned from a successful action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    pub runtime_id: Option<String>,
    pub exit_code: Option<i32>,
}

/// Everything that can reach a task worker.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskInput {
    /// A status reported for one container, by the runtime's event stream
    /// or by steady-state verification.
    ContainerEvent {
        container: String,
        status: ContainerStatus,
        metadata: ContainerMetadata,
    },
    /// A newer desired status from the control plane.
    DesiredStatus {
        status: TaskStatus,
        stop_sequence_number: u64,
    },
    ActionFinished {
        container: String,
        transition: Transition,
        result: ActionResult,
    },
    /// The retry delay for a failed action has passed.
    RetryReady { container: String },
    /// The runtime's answer after a stop reported "not running".
    Reconciled {
        container: String,
        status: ContainerStatus,
        metadata: ContainerMetadata,
    },
}

/// Side effects requested by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    Execute {
        container: String,
        transition: Transition,
    },
    ScheduleRetry {
        container: String,
    },
    Reconcile {
        container: String,
        runtime_id: String,
    },
    /// Persist the engine state.
    Persist,
}

/// Result of feeding one input to the core.
#[derive(Debug, Clone, Default)]
pub struct TaskStep {
    pub commands: Vec<TaskCommand>,
    /// Outward state changes, containers before the task.
    pub state_changes: Vec<StateChange>,
}

/// Coarse phase of a managed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Held by the stop-before-start gate.
    Waiting,
    /// Moving containers toward their desired status.
    Running,
    /// Every container is at steady state; verification is active.
    Steady,
    Stopping,
    Stopped,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPhase::Waiting => "WAITING",
            TaskPhase::Running => "RUNNING",
            TaskPhase::Steady => "STEADY",
            TaskPhase::Stopping => "STOPPING",
            TaskPhase::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct TaskCore {
    pub(crate) task: Task,
    pub(crate) timeouts: Timeouts,
    pub(crate) max_attempts: u32,
    pub(crate) name_prefix: String,
    pub(crate) gate_open: bool,
    /// Containers with an action or retry delay outstanding.
    pub(crate) in_flight: HashSet<String>,
    /// Failed attempts of the current transition, per container.
    pub(crate) attempts: HashMap<String, u32>,
    /// Containers whose stop reported "not running" and that now wait for
    /// the runtime to confirm they stopped.
    pub(crate) awaiting_stop_event: HashSet<String>,
}

impl TaskCore {
    pub fn new(task: Task, config: &EngineConfig) -> Self {
        let gate_open = task.start_sequence_number == 0;
        Self {
            task,
            timeouts: config.timeouts,
            max_attempts: config.max_transition_attempts,
            name_prefix: config.runtime_name_prefix.clone(),
            gate_open,
            in_flight: HashSet::new(),
            attempts: HashMap::new(),
            awaiting_stop_event: HashSet::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn phase(&self) -> TaskPhase {
        if self.task.known_status.is_terminal() {
            TaskPhase::Stopped
        } else if self.task.desired_status.is_terminal() {
            TaskPhase::Stopping
        } else if !self.gate_open {
            TaskPhase::Waiting
        } else if self.task.known_status == TaskStatus::Running && self.task.all_at_target() {
            TaskPhase::Steady
        } else {
            TaskPhase::Running
        }
    }

    /// First step after the worker starts: report anything a restored task
    /// had not reported yet, then begin progressing.
    pub fn start(&mut self) -> TaskStep {
        self.finish_step(Vec::new())
    }

    /// The stop-before-start gate opened.
    pub fn open_gate(&mut self) -> TaskStep {
        self.gate_open = true;
        self.finish_step(Vec::new())
    }

    /// Feed one input and collect what must happen next.
    pub fn step(&mut self, input: TaskInput) -> TaskStep {
        let mut commands = Vec::new();
        match input {
            TaskInput::ContainerEvent {
                container,
                status,
                metadata,
            } => self.handle_container_change(&container, status, metadata),
            TaskInput::DesiredStatus {
                status,
                stop_sequence_number,
            } => self.handle_desired_status(status, stop_sequence_number),
            TaskInput::ActionFinished {
                container,
                transition,
                result,
            } => self.handle_action_finished(&container, transition, result, &mut commands),
            TaskInput::RetryReady { container } => {
                self.in_flight.remove(&container);
            }
            TaskInput::Reconciled {
                container,
                status,
                metadata,
            } => self.handle_reconciled(&container, status, metadata),
        }
        self.finish_step(commands)
    }

    fn finish_step(&mut self, mut commands: Vec<TaskCommand>) -> TaskStep {
        self.task.update_desired_status();
        commands.extend(self.progress_containers());
        self.task.update_known_status();
        let state_changes = self.collect_state_changes();
        TaskStep {
            commands,
            state_changes,
        }
    }

    /// Issue the next transition for every container that can make one.
    ///
    /// Containers with work in flight are skipped. Local moves (marking
    /// never-started containers stopped) can unblock others, so the pass
    /// repeats until nothing changes locally.
    fn progress_containers(&mut self) -> Vec<TaskCommand> {
        let mut commands = Vec::new();
        if !self.gate_open && !self.task.desired_status.is_terminal() {
            return commands;
        }

        loop {
            let mut moved_locally = false;

            for idx in 0..self.task.containers.len() {
                let name = self.task.containers[idx].name.clone();
                if self.in_flight.contains(&name) || self.awaiting_stop_event.contains(&name) {
                    continue;
                }

                let container = &self.task.containers[idx];
                let step = next_step(container, &self.timeouts);
                let ready = match step {
                    NextStep::Idle => continue,
                    NextStep::Local(status) => {
                        dependencies_are_resolved(container, &self.task, status)
                    }
                    NextStep::Act(transition) => {
                        dependencies_are_resolved(container, &self.task, transition.target())
                    }
                };
                if !ready {
                    continue;
                }

                match step {
                    NextStep::Local(status) => {
                        self.task.containers[idx].advance_known_status(status);
                        info!(
                            task = %self.task.arn,
                            container = %name,
                            %status,
                            "container never started; marked without runtime call"
                        );
                        moved_locally = true;
                    }
                    NextStep::Act(transition) => {
                        self.prepare(idx, &transition);
                        debug!(
                            task = %self.task.arn,
                            container = %name,
                            action = %transition.action,
                            "issuing transition"
                        );
                        self.in_flight.insert(name.clone());
                        commands.push(TaskCommand::Execute {
                            container: name,
                            transition,
                        });
                    }
                    NextStep::Idle => {}
                }
            }

            if !moved_locally {
                break;
            }
            self.task.update_desired_status();
        }

        commands
    }

    fn prepare(&mut self, idx: usize, transition: &Transition) {
        use super::transition::Action;

        if transition.action != Action::Create {
            return;
        }
        let name = runtime_name(&self.name_prefix, &self.task, &self.task.containers[idx].name);
        let container = &mut self.task.containers[idx];
        if container.runtime_name.is_none() {
            container.runtime_name = Some(name);
        }
    }

    /// Drain pending reports, marking them sent.
    fn collect_state_changes(&mut self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        let arn = self.task.arn.clone();

        for container in self.task.containers.iter_mut() {
            if let Some(status) = container.pending_report() {
                container.sent_status = status;
                changes.push(StateChange::Container(ContainerStateChange {
                    task_arn: arn.clone(),
                    container_name: container.name.clone(),
                    status,
                    runtime_id: container.runtime_id.clone(),
                    exit_code: container.exit_code,
                    reason: container.applying_error.clone(),
                }));
            }
        }

        if let Some(status) = self.task.pending_report() {
            self.task.sent_status = status;
            let reason = if status.is_terminal() {
                self.task
                    .containers
                    .iter()
                    .find_map(|c| c.applying_error.clone())
            } else {
                None
            };
            changes.push(StateChange::Task(TaskStateChange {
                task_arn: arn,
                status,
                reason,
            }));
        }

        changes
    }

    /// Containers to check during steady-state verification, as
    /// `(name, runtime id, known status)`.
    pub fn steady_checks(&self) -> Vec<(String, String, ContainerStatus)> {
        self.task
            .containers
            .iter()
            .filter(|c| !c.known_status.is_terminal())
            .filter_map(|c| {
                c.runtime_id
                    .clone()
                    .map(|id| (c.name.clone(), id, c.known_status))
            })
            .collect()
    }
}

/// Name a container is created under: stable for a given task and
/// container, and restricted to characters runtimes accept.
pub fn runtime_name(prefix: &str, task: &Task, container: &str) -> String {
    let digest = blake3::hash(format!("{}/{}", task.arn, container).as_bytes());
    let suffix: String = digest.to_hex().chars().take(16).collect();
    let raw = format!(
        "{prefix}-{}-{}-{container}-{suffix}",
        task.family, task.version
    );
    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    while name.contains("--") {
        name = name.replace("--", "-");
    }
    name.trim_matches('-').to_string()
}

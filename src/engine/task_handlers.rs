// src/engine/task_handlers.rs

//! Input handlers for [`TaskCore`].

use tracing::{debug, error, info, warn};

use crate::api::{ContainerStatus, TaskStatus};
use crate::runtime::ContainerMetadata;

use super::task_core::{ActionResult, TaskCommand, TaskCore};
use super::transition::{Action, Disposition, Transition, classify, within_budget};

impl TaskCore {
    /// Apply a reported status to one container, forward moves only.
    pub(crate) fn handle_container_change(
        &mut self,
        name: &str,
        status: ContainerStatus,
        metadata: ContainerMetadata,
    ) {
        let arn = self.task.arn.clone();
        let Some(container) = self.task.container_mut(name) else {
            debug!(task = %arn, container = %name, "status for unknown container ignored");
            return;
        };

        if !container.advance_known_status(status) {
            debug!(
                task = %arn,
                container = %name,
                %status,
                known = %container.known_status,
                "discarding non-forward container status"
            );
            return;
        }

        if container.runtime_id.is_none() {
            container.runtime_id = metadata.runtime_id;
        }
        if metadata.exit_code.is_some() {
            container.exit_code = metadata.exit_code;
        }
        if status.is_terminal() {
            if let Some(err) = metadata.error {
                container.applying_error.get_or_insert(err);
            }
            self.awaiting_stop_event.remove(name);
        }

        info!(
            task = %arn,
            container = %name,
            %status,
            essential = container.essential,
            "container status changed"
        );
    }

    pub(crate) fn handle_desired_status(&mut self, status: TaskStatus, stop_sequence_number: u64) {
        if !self.task.set_desired_status(status) {
            debug!(
                task = %self.task.arn,
                %status,
                desired = %self.task.desired_status,
                "desired status not newer; ignored"
            );
            return;
        }
        if status.is_terminal() && self.task.stop_sequence_number == 0 {
            self.task.stop_sequence_number = stop_sequence_number;
        }
        info!(task = %self.task.arn, %status, "desired status updated");
    }

    pub(crate) fn handle_action_finished(
        &mut self,
        name: &str,
        transition: Transition,
        result: ActionResult,
        commands: &mut Vec<TaskCommand>,
    ) {
        self.in_flight.remove(name);
        let arn = self.task.arn.clone();
        let action = transition.action;

        match result {
            ActionResult::Skipped => {
                debug!(task = %arn, container = %name, %action, "action skipped");
            }
            ActionResult::Done(output) => {
                self.attempts.remove(name);
                let Some(container) = self.task.container_mut(name) else {
                    return;
                };
                if output.runtime_id.is_some() {
                    container.runtime_id = output.runtime_id;
                }
                if output.exit_code.is_some() {
                    container.exit_code = output.exit_code;
                }
                if container.advance_known_status(action.target()) {
                    info!(
                        task = %arn,
                        container = %name,
                        %action,
                        status = %container.known_status,
                        "transition complete"
                    );
                }
                if container.known_status.is_terminal() {
                    self.awaiting_stop_event.remove(name);
                }
                if action == Action::Create {
                    commands.push(TaskCommand::Persist);
                }
            }
            ActionResult::Failed(err) => {
                let attempts = {
                    let count = self.attempts.entry(name.to_string()).or_insert(0);
                    *count += 1;
                    *count
                };
                let disposition =
                    within_budget(classify(action, &err), &transition, attempts, self.max_attempts);

                match disposition {
                    Disposition::Retry => {
                        warn!(
                            task = %arn,
                            container = %name,
                            %action,
                            attempts,
                            error = %err,
                            "transition failed; retrying"
                        );
                        self.in_flight.insert(name.to_string());
                        commands.push(TaskCommand::ScheduleRetry {
                            container: name.to_string(),
                        });
                    }
                    Disposition::Reconcile => {
                        info!(
                            task = %arn,
                            container = %name,
                            %action,
                            error = %err,
                            "not retrying; checking container status with the runtime"
                        );
                        self.attempts.remove(name);
                        let runtime_id = self
                            .task
                            .container(name)
                            .and_then(|c| c.runtime_id.clone());
                        match runtime_id {
                            Some(runtime_id) => {
                                self.in_flight.insert(name.to_string());
                                self.awaiting_stop_event.insert(name.to_string());
                                commands.push(TaskCommand::Reconcile {
                                    container: name.to_string(),
                                    runtime_id,
                                });
                            }
                            None => {
                                if let Some(container) = self.task.container_mut(name) {
                                    container.advance_known_status(ContainerStatus::Stopped);
                                }
                            }
                        }
                    }
                    Disposition::Fail => {
                        error!(
                            task = %arn,
                            container = %name,
                            %action,
                            attempts,
                            error = %err,
                            "transition failed; stopping container"
                        );
                        self.attempts.remove(name);
                        let Some(container) = self.task.container_mut(name) else {
                            return;
                        };
                        container.applying_error = Some(format!("{action} failed: {err}"));
                        container.desire_stopped();
                        if container.essential {
                            self.task.set_desired_status(TaskStatus::Stopped);
                        }
                    }
                }
            }
        }
    }

    /// The runtime's view after a stop came back "not running".
    pub(crate) fn handle_reconciled(
        &mut self,
        name: &str,
        status: ContainerStatus,
        metadata: ContainerMetadata,
    ) {
        self.in_flight.remove(name);
        if status.is_terminal() {
            self.handle_container_change(name, status, metadata);
            return;
        }
        warn!(
            task = %self.task.arn,
            container = %name,
            runtime_status = %status,
            error = ?metadata.error,
            "runtime does not confirm the container stopped; waiting for its stop event"
        );
    }
}

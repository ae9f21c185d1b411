// src/engine/transition.rs

//! Pure transition function for one container.
//!
//! Given a container's known and target status this decides the next step,
//! how long that step may take, and how a failure of it is handled. Nothing
//! here touches the runtime or the clock, which keeps the state machine
//! testable on its own.

use std::fmt;
use std::time::Duration;

use crate::api::{Container, ContainerStatus};
use crate::config::Timeouts;
use crate::runtime::{RuntimeError, RuntimeErrorKind};

/// A runtime-facing operation on one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Pull,
    Create,
    Start,
    /// Wire the task's network into a started network-setup container.
    Provision,
    Stop,
    Remove,
}

impl Action {
    /// The status a successful action moves the container to.
    pub fn target(self) -> ContainerStatus {
        match self {
            Action::Pull => ContainerStatus::Pulled,
            Action::Create => ContainerStatus::Created,
            Action::Start => ContainerStatus::Running,
            Action::Provision => ContainerStatus::ResourcesProvisioned,
            Action::Stop | Action::Remove => ContainerStatus::Stopped,
        }
    }

    pub fn timeout(self, timeouts: &Timeouts) -> Duration {
        match self {
            Action::Pull => timeouts.pull,
            Action::Create => timeouts.create,
            Action::Start => timeouts.start,
            Action::Provision => timeouts.provision,
            Action::Stop => timeouts.stop,
            Action::Remove => timeouts.remove,
        }
    }

    pub fn retry_policy(self) -> RetryPolicy {
        match self {
            Action::Stop => RetryPolicy::Unbounded,
            Action::Remove => RetryPolicy::Never,
            _ => RetryPolicy::Bounded,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Pull => "pull",
            Action::Create => "create",
            Action::Start => "start",
            Action::Provision => "provision",
            Action::Stop => "stop",
            Action::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// How often a failed action may be attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Never,
    /// Up to the configured maximum number of attempts.
    Bounded,
    Unbounded,
}

/// A planned runtime action with its time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Transition {
    pub fn new(action: Action, timeouts: &Timeouts) -> Self {
        Self {
            action,
            timeout: action.timeout(timeouts),
            retry: action.retry_policy(),
        }
    }

    pub fn target(&self) -> ContainerStatus {
        self.action.target()
    }
}

/// The next step for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// At (or past) the target; nothing to do.
    Idle,
    /// Invoke a runtime action.
    Act(Transition),
    /// Move to a status without calling the runtime.
    Local(ContainerStatus),
}

/// Decide the next step for `container`, one status at a time.
pub fn next_step(container: &Container, timeouts: &Timeouts) -> NextStep {
    let known = container.known_status;
    let target = container.target_status();

    if known.is_terminal() || known >= target {
        return NextStep::Idle;
    }

    if target.is_terminal() {
        // Nothing was ever started, so there is nothing to stop.
        if known < ContainerStatus::Running {
            return NextStep::Local(ContainerStatus::Stopped);
        }
        return NextStep::Act(Transition::new(Action::Stop, timeouts));
    }

    let action = match known {
        ContainerStatus::None => Action::Pull,
        ContainerStatus::Pulled => Action::Create,
        ContainerStatus::Created => Action::Start,
        ContainerStatus::Running => Action::Provision,
        _ => return NextStep::Idle,
    };
    NextStep::Act(Transition::new(action, timeouts))
}

/// What to do about a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Attempt the same action again after the retry delay.
    Retry,
    /// Do not retry; ask the runtime for the container's real status and
    /// advance only if it confirms the action's outcome.
    Reconcile,
    /// Give up on the container.
    Fail,
}

/// Classify a failed action by its error kind.
pub fn classify(action: Action, error: &RuntimeError) -> Disposition {
    use RuntimeErrorKind::*;

    match (action, error.kind) {
        (Action::Stop, NotRunning | NotFound) => Disposition::Reconcile,
        (Action::Stop, _) => Disposition::Retry,
        (Action::Remove, _) => Disposition::Fail,
        (_, Transient | Timeout) => Disposition::Retry,
        (_, NotRunning | NotFound | Fatal) => Disposition::Fail,
    }
}

/// Apply the retry budget to a disposition. `attempts` counts the attempts
/// made so far, including the one that just failed.
pub fn within_budget(
    disposition: Disposition,
    transition: &Transition,
    attempts: u32,
    max_attempts: u32,
) -> Disposition {
    match (disposition, transition.retry) {
        (Disposition::Retry, RetryPolicy::Never) => Disposition::Fail,
        (Disposition::Retry, RetryPolicy::Bounded) if attempts >= max_attempts => {
            Disposition::Fail
        }
        (d, _) => d,
    }
}

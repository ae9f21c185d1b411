// src/dag/resolver.rs

//! Admission-time validation and run-time readiness checks.

use std::collections::HashSet;

use crate::api::{Container, ContainerStatus, Task};
use crate::errors::{EngineError, Result};

use super::graph::{DependencyGraph, effective_dependencies};

/// Validate a task's containers and their dependency graph.
///
/// Fails on an empty task, duplicate container names, dependencies on
/// containers that do not exist, and dependency cycles.
pub fn validate_dependencies(task: &Task) -> Result<()> {
    if task.containers.is_empty() {
        return Err(EngineError::InvalidTask(format!(
            "task {} has no containers",
            task.arn
        )));
    }

    let mut seen = HashSet::new();
    for container in task.containers.iter() {
        if !seen.insert(container.name.as_str()) {
            return Err(EngineError::InvalidTask(format!(
                "task {} defines container '{}' more than once",
                task.arn, container.name
            )));
        }
    }

    let graph = DependencyGraph::from_task(task);

    if let Some((container, dependency)) = graph.unknown_dependencies().into_iter().next() {
        return Err(EngineError::UnknownDependency {
            container,
            dependency,
        });
    }

    if let Some(containers) = graph.find_cycle() {
        return Err(EngineError::DependencyCycle {
            task: task.arn.clone(),
            containers,
        });
    }

    Ok(())
}

/// Whether `container` may move to `next` given the known status of the
/// rest of `task`.
///
/// Moving toward running: every dependency that gates a move past its
/// `dependent_status` must have reached its `satisfied_status`.
/// Stopping: every container depending on this one must already be
/// stopped, so shared resources are torn down last.
pub fn dependencies_are_resolved(container: &Container, task: &Task, next: ContainerStatus) -> bool {
    if next.is_terminal() {
        return dependents_are_stopped(container, task);
    }

    effective_dependencies(container, task)
        .iter()
        .filter(|dep| next > dep.dependent_status)
        .all(|dep| {
            task.container(&dep.container_name)
                .is_some_and(|d| d.known_status >= dep.satisfied_status)
        })
}

fn dependents_are_stopped(container: &Container, task: &Task) -> bool {
    task.containers
        .iter()
        .filter(|other| other.name != container.name)
        .filter(|other| {
            effective_dependencies(other, task)
                .iter()
                .any(|d| d.container_name == container.name)
        })
        .all(|other| other.known_status.is_terminal())
}

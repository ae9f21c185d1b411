#![allow(dead_code)]

use std::sync::Arc;

use taskengine::TaskEngine;
use taskengine::api::{Container, StateChange, Task};
use taskengine::config::EngineConfig;
use tokio::sync::mpsc;

pub use taskengine_test_utils::*;

/// An engine wired to fakes, with its outbound channel taken.
pub struct Harness {
    pub engine: TaskEngine,
    pub runtime: FakeRuntime,
    pub saver: RecordingSaver,
    pub network: RecordingNetwork,
    pub events: mpsc::Receiver<StateChange>,
}

impl Harness {
    /// Initialised engine with [`fast_config`] and fresh fakes.
    pub async fn start() -> Self {
        Self::start_with(fast_config(), FakeRuntime::new(), RecordingSaver::new()).await
    }

    pub async fn start_with(config: EngineConfig, runtime: FakeRuntime, saver: RecordingSaver) -> Self {
        init_tracing();
        let network = RecordingNetwork::new();
        let engine = TaskEngine::new(
            config,
            Arc::new(runtime.clone()),
            Arc::new(saver.clone()),
            Arc::new(network.clone()),
        );
        let events = engine
            .state_change_events()
            .expect("state change receiver already taken");
        engine.init().await.expect("engine init failed");

        Self {
            engine,
            runtime,
            saver,
            network,
            events,
        }
    }

    pub fn task(&self, arn: &str) -> Task {
        self.engine
            .get_task_by_arn(arn)
            .unwrap_or_else(|| panic!("task {arn} not registered"))
    }

    pub fn container(&self, arn: &str, name: &str) -> Container {
        self.task(arn)
            .container(name)
            .cloned()
            .unwrap_or_else(|| panic!("container {name} not in task {arn}"))
    }

    /// Runtime id of a container, once it has been created.
    pub async fn runtime_id(&self, arn: &str, name: &str) -> String {
        let mut id = None;
        wait_until(|| {
            id = self
                .engine
                .get_task_by_arn(arn)
                .and_then(|t| t.container(name).and_then(|c| c.runtime_id.clone()));
            id.is_some()
        })
        .await;
        id.unwrap_or_default()
    }

    /// Wait until the task is purged from the engine.
    pub async fn wait_removed(&self, arn: &str) {
        wait_until(|| self.engine.get_task_by_arn(arn).is_none()).await;
    }
}

/// `(container, status)` of a container change, or `None`.
pub fn container_change(change: &StateChange) -> Option<(&str, String)> {
    match change {
        StateChange::Container(c) => Some((c.container_name.as_str(), c.status.to_string())),
        _ => None,
    }
}

/// Status of a task change, or `None`.
pub fn task_change(change: &StateChange) -> Option<String> {
    match change {
        StateChange::Task(t) => Some(t.status.to_string()),
        _ => None,
    }
}

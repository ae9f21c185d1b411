// src/engine/context.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc, watch};
use tracing::warn;

use crate::api::StateChange;
use crate::config::EngineConfig;
use crate::network::NetworkSetup;
use crate::runtime::ContainerRuntime;
use crate::statemanager::StateSaver;

use super::sequencing::SequentialWaitGroup;
use super::state::EngineState;

/// Everything a task worker shares with the rest of the engine.
pub(crate) struct EngineContext {
    pub config: EngineConfig,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub saver: Arc<dyn StateSaver>,
    pub network: Arc<dyn NetworkSetup>,
    pub state: Arc<EngineState>,
    pub events_tx: mpsc::Sender<StateChange>,
    /// Serialises image pulls when the runtime cannot pull concurrently.
    pub pull_lock: Mutex<()>,
    pub stop_group: SequentialWaitGroup,
    pub shutdown: watch::Receiver<bool>,
    concurrent_pull: AtomicBool,
}

impl EngineContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        runtime: Arc<dyn ContainerRuntime>,
        saver: Arc<dyn StateSaver>,
        network: Arc<dyn NetworkSetup>,
        state: Arc<EngineState>,
        events_tx: mpsc::Sender<StateChange>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            runtime,
            saver,
            network,
            state,
            events_tx,
            pull_lock: Mutex::new(()),
            stop_group: SequentialWaitGroup::new(),
            shutdown,
            concurrent_pull: AtomicBool::new(false),
        }
    }

    pub fn concurrent_pull_enabled(&self) -> bool {
        self.concurrent_pull.load(Ordering::SeqCst)
    }

    pub fn set_concurrent_pull(&self, enabled: bool) {
        self.concurrent_pull.store(enabled, Ordering::SeqCst);
    }

    /// Persist the current registry. Failures are logged, never fatal.
    pub fn save(&self) {
        if let Err(err) = self.saver.save(&self.state.snapshot()) {
            warn!(error = %err, "saving state failed");
        }
    }

    pub fn force_save(&self) {
        if let Err(err) = self.saver.force_save(&self.state.snapshot()) {
            warn!(error = %err, "force-saving state failed");
        }
    }
}
